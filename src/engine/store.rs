// src/engine/store.rs
//! 内存 KV 存储：DashMap<String, Entry>，TTL 记为绝对 Instant。
//! - set 总是整体替换 Entry，不做原地修改
//! - 读路径带惰性过期：发现过期就地删除，过期值绝不可见
//! - sweep 整次扫描只取一次 now，返回被删除的 key 列表

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// TTL 上限，约 100 年。再大的 TTL 一律压到这里，
/// 保证加到 Instant 上不会溢出。
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// 单个存储项：值 + 可选的绝对过期时刻，None 表示永不过期
#[derive(Debug, Clone)]
pub struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    pub fn new(value: String, ttl: Option<Duration>) -> Self {
        Entry {
            value,
            expires_at: ttl.map(|t| Instant::now() + t.min(MAX_TTL)),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// 以给定时刻判断是否已过期
    pub fn is_expired_at(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(t) if t <= now)
    }
}

/// 一次读取的结果：命中（带剩余寿命）、刚过期（已就地删除）、不存在
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found {
        value: String,
        remaining: Option<Duration>,
    },
    Expired,
    Missing,
}

/// 并发 KV 表，Clone 共享同一份数据
#[derive(Debug, Clone, Default)]
pub struct Store {
    data: Arc<DashMap<String, Entry>>,
}

impl Store {
    pub fn new() -> Self {
        Store {
            data: Arc::new(DashMap::new()),
        }
    }

    /// 写入或整体替换，ttl 为 None 表示永不过期。总是成功。
    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.data
            .insert(key.to_string(), Entry::new(value.to_string(), ttl));
    }

    /// 读取并做惰性过期：每次调用现取 now。
    /// 过期项确认后删除（只删仍然过期的，避免与并发 set 竞争），
    /// 与后台 sweep 谁先到谁清理，两边都幂等。
    pub fn lookup(&self, key: &str) -> Lookup {
        let now = Instant::now();
        {
            let Some(entry) = self.data.get(key) else {
                return Lookup::Missing;
            };
            if !entry.is_expired_at(now) {
                let remaining = entry.expires_at.map(|t| t.saturating_duration_since(now));
                return Lookup::Found {
                    value: entry.value().value().to_string(),
                    remaining,
                };
            }
        }
        self.data.remove_if(key, |_, e| e.is_expired_at(now));
        Lookup::Expired
    }

    /// 命中返回值，过期或不存在返回 None
    pub fn get(&self, key: &str) -> Option<String> {
        match self.lookup(key) {
            Lookup::Found { value, .. } => Some(value),
            _ => None,
        }
    }

    /// 删除条目，返回是否真的删掉了
    pub fn remove(&self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    /// 扫全表删除过期项并返回它们的 key。整次扫描只取一次 now。
    pub fn sweep(&self) -> Vec<String> {
        let now = Instant::now();
        let mut removed = Vec::new();
        self.data.retain(|key, entry| {
            if entry.is_expired_at(now) {
                removed.push(key.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// 当前条目数（含尚未清扫的过期项）
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 粗略内存占用：key 与 value 的字节数之和
    pub fn approx_bytes(&self) -> usize {
        self.data
            .iter()
            .map(|e| e.key().len() + e.value().value().len())
            .sum()
    }

    /// 测试用：直接放入一个已过期的条目
    #[cfg(test)]
    pub(crate) fn insert_expired(&self, key: &str, value: &str) {
        self.data.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() - Duration::from_secs(1)),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    // ---------- 基本读写 ----------

    #[test]
    fn test_set_and_get() {
        let store = Store::new();
        store.set("foo", "bar", None);
        assert_eq!(store.get("foo"), Some("bar".to_string()));
    }

    #[test]
    fn test_get_missing_key() {
        let store = Store::new();
        assert_eq!(store.get("nope"), None);
        assert_eq!(store.lookup("nope"), Lookup::Missing);
    }

    #[test]
    fn test_set_replaces_whole_entry() {
        let store = Store::new();
        store.set("k", "v1", Some(Duration::from_secs(100)));
        // 再次 set 不带 TTL，旧的过期时间必须被一并替换掉
        store.set("k", "v2", None);
        assert_eq!(
            store.lookup("k"),
            Lookup::Found {
                value: "v2".to_string(),
                remaining: None
            }
        );
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = Store::new();
        store.set("k", "v", None);
        assert!(store.remove("k"));
        assert!(!store.remove("k"));
        assert_eq!(store.get("k"), None);
    }

    // ---------- TTL 与惰性过期 ----------

    #[test]
    fn test_ttl_remaining_bounds() {
        let store = Store::new();
        store.set("k", "v", Some(Duration::from_secs(5)));
        let Lookup::Found {
            remaining: Some(remaining),
            ..
        } = store.lookup("k")
        else {
            panic!("条目应当还活着");
        };
        assert!(remaining <= Duration::from_secs(5));
        assert!(remaining > Duration::from_secs(4));
    }

    #[test]
    fn test_ttl_no_expiry() {
        let store = Store::new();
        store.set("k", "v", None);
        assert_eq!(
            store.lookup("k"),
            Lookup::Found {
                value: "v".to_string(),
                remaining: None
            }
        );
        assert_eq!(store.lookup("missing"), Lookup::Missing);
    }

    #[test]
    fn test_huge_ttl_is_capped() {
        let store = Store::new();
        // u64 能表示的最大秒数也不能把过期时刻加溢出
        store.set("k", "v", Some(Duration::from_secs(u64::MAX)));
        let Lookup::Found {
            remaining: Some(remaining),
            ..
        } = store.lookup("k")
        else {
            panic!("超大 TTL 的条目应当照常可读");
        };
        assert!(remaining <= MAX_TTL);
    }

    #[test]
    fn test_lazy_expiry_removes_entry() {
        let store = Store::new();
        store.insert_expired("gone", "v");
        assert_eq!(store.len(), 1);

        // 第一次读发现过期：报告 Expired 并就地删除
        assert_eq!(store.lookup("gone"), Lookup::Expired);
        assert_eq!(store.len(), 0);
        // 之后就是普通的不存在
        assert_eq!(store.lookup("gone"), Lookup::Missing);
    }

    #[test]
    fn test_expired_value_never_visible() {
        let store = Store::new();
        store.set("k", "v", Some(Duration::from_millis(30)));
        assert_eq!(store.get("k"), Some("v".to_string()));
        sleep(Duration::from_millis(60));
        assert_eq!(store.get("k"), None);
    }

    // ---------- sweep ----------

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = Store::new();
        store.set("alive", "v", None);
        store.set("later", "v", Some(Duration::from_secs(100)));
        store.insert_expired("dead1", "v");
        store.insert_expired("dead2", "v");

        let mut removed = store.sweep();
        removed.sort();
        assert_eq!(removed, vec!["dead1".to_string(), "dead2".to_string()]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("alive"), Some("v".to_string()));
    }

    #[test]
    fn test_sweep_empty_store() {
        let store = Store::new();
        assert!(store.sweep().is_empty());
    }

    #[test]
    fn test_sweep_then_lookup_is_missing() {
        let store = Store::new();
        store.insert_expired("k", "v");
        let removed = store.sweep();
        assert_eq!(removed, vec!["k".to_string()]);
        // sweep 与惰性读谁先到都一样：之后读到的是 Missing
        assert_eq!(store.lookup("k"), Lookup::Missing);
    }

    // ---------- 杂项 ----------

    #[test]
    fn test_approx_bytes() {
        let store = Store::new();
        store.set("ab", "cdef", None);
        assert_eq!(store.approx_bytes(), 6);
    }

    #[test]
    fn test_clone_shares_data() {
        let store = Store::new();
        let other = store.clone();
        store.set("k", "v", None);
        assert_eq!(other.get("k"), Some("v".to_string()));
    }
}
