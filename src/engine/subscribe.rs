// src/engine/subscribe.rs
//! 订阅注册表：双向索引，key 与会话互查。
//! 所有操作幂等；两侧索引随退订收缩，空集合不留在表里。

use dashmap::{DashMap, DashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SubscriptionManager {
    // key -> 订阅该 key 的会话 ID 集合
    by_key: Arc<DashMap<String, DashSet<u64>>>,
    // 会话 ID -> 该会话订阅的 key 集合
    by_session: Arc<DashMap<u64, DashSet<String>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            by_key: Arc::new(DashMap::new()),
            by_session: Arc::new(DashMap::new()),
        }
    }

    // 登记订阅，重复登记等于一次
    pub fn subscribe(&self, key: &str, session_id: u64) {
        self.by_key
            .entry(key.to_string())
            .or_insert_with(|| DashSet::new())
            .insert(session_id);

        self.by_session
            .entry(session_id)
            .or_insert_with(|| DashSet::new())
            .insert(key.to_string());
    }

    // 取消一个订阅，未订阅时是无害空操作
    pub fn unsubscribe(&self, key: &str, session_id: u64) {
        if let Some(sessions) = self.by_key.get(key) {
            sessions.remove(&session_id);
        }
        self.by_key.remove_if(key, |_, sessions| sessions.is_empty());

        if let Some(keys) = self.by_session.get(&session_id) {
            keys.remove(key);
        }
        self.by_session
            .remove_if(&session_id, |_, keys| keys.is_empty());
    }

    // 移除某个 key 的全部订阅，返回受影响的会话 ID
    pub fn unsubscribe_all(&self, key: &str) -> Vec<u64> {
        let Some((_, sessions)) = self.by_key.remove(key) else {
            return Vec::new();
        };
        let affected: Vec<u64> = sessions.into_iter().collect();

        for session_id in &affected {
            if let Some(keys) = self.by_session.get(session_id) {
                keys.remove(key);
            }
            self.by_session
                .remove_if(session_id, |_, keys| keys.is_empty());
        }
        affected
    }

    // 会话断开时清掉它的所有订阅
    pub fn unsubscribe_session(&self, session_id: u64) {
        if let Some((_, keys)) = self.by_session.remove(&session_id) {
            for key in keys.into_iter() {
                if let Some(sessions) = self.by_key.get(&key) {
                    sessions.remove(&session_id);
                }
                self.by_key.remove_if(&key, |_, sessions| sessions.is_empty());
            }
        }
    }

    // 当前订阅了该 key 的会话 ID
    pub fn targets_for(&self, key: &str) -> Vec<u64> {
        self.by_key
            .get(key)
            .map(|sessions| sessions.iter().map(|id| *id).collect())
            .unwrap_or_default()
    }

    /// 被订阅的 key 数
    pub fn key_count(&self) -> usize {
        self.by_key.len()
    }

    /// 持有订阅的会话数
    pub fn session_count(&self) -> usize {
        self.by_session.len()
    }

    /// (key, 会话) 订阅对总数
    pub fn subscription_count(&self) -> usize {
        self.by_key.iter().map(|e| e.value().len()).sum()
    }
}
