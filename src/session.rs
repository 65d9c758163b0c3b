// src/session.rs
//! 会话注册表：接入时分配稳定递增的 u64 会话 ID，
//! 维护 ID -> 出站队列发送端与连接信息。
//! 推送一律按会话 ID 寻址，不按对端地址。

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;

/// 单个会话的登记信息
#[derive(Debug)]
pub struct SessionInfo {
    pub addr: SocketAddr,
    pub connect_time: Instant,
    pub last_command: String,
    pub last_command_time: Instant,
    outbound: mpsc::Sender<String>,
}

#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<u64, SessionInfo>>,
    next_id: Arc<AtomicU64>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// 接入新连接：分配会话 ID 并登记出站发送端
    pub fn register(&self, addr: SocketAddr, outbound: mpsc::Sender<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sessions.insert(
            id,
            SessionInfo {
                addr,
                connect_time: Instant::now(),
                last_command: "None".to_string(),
                last_command_time: Instant::now(),
                outbound,
            },
        );
        id
    }

    pub fn unregister(&self, id: u64) {
        self.sessions.remove(&id);
    }

    /// 取出站发送端的克隆。克隆出来再发，不在持有分片锁时写队列。
    pub fn sender(&self, id: u64) -> Option<mpsc::Sender<String>> {
        self.sessions.get(&id).map(|s| s.outbound.clone())
    }

    pub fn update_command(&self, id: u64, command: &str) {
        if let Some(mut session) = self.sessions.get_mut(&id) {
            session.last_command = command.to_string();
            session.last_command_time = Instant::now();
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// CLIENTS 命令的输出，一行一个会话
    pub fn list(&self) -> String {
        let mut response = String::new();
        for entry in self.sessions.iter() {
            let session = entry.value();
            response.push_str(&format!(
                "id={} addr={} age={}s idle={}s cmd={}\n",
                entry.key(),
                session.addr,
                session.connect_time.elapsed().as_secs(),
                session.last_command_time.elapsed().as_secs(),
                session.last_command
            ));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn test_register_assigns_increasing_ids() {
        let registry = SessionRegistry::new();
        let (tx, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);

        let a = registry.register(addr(), tx);
        let b = registry.register(addr(), tx2);
        assert!(b > a);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_sender_routes_to_session_queue() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        let id = registry.register(addr(), tx);

        registry.sender(id).unwrap().try_send("hi\n".to_string()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "hi\n");
    }

    #[test]
    fn test_unregister_removes_session() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.register(addr(), tx);

        registry.unregister(id);
        assert!(registry.sender(id).is_none());
        assert_eq!(registry.count(), 0);
        // 幂等
        registry.unregister(id);
    }

    #[test]
    fn test_list_shows_last_command() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.register(addr(), tx);
        registry.update_command(id, "GET");

        let listing = registry.list();
        assert!(listing.contains(&format!("id={}", id)));
        assert!(listing.contains("cmd=GET"));
    }
}
