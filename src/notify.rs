// src/notify.rs
//! 变更通知分发：
//! - 全局有界事件队列 + 单个派发任务，同一 key 的变更按写入顺序送达
//! - 逐会话 try_send，某个会话队列满只丢它这一条，不拖慢其他会话
//! - 入队侧限时阻塞，超时丢弃该通知并告警，存储数据不受影响

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tracing::{debug, warn};

use crate::engine::SubscriptionManager;
use crate::monitor::Metrics;
use crate::protocol;
use crate::session::SessionRegistry;

/// 一次 key 变更或移除
#[derive(Debug)]
pub enum Event {
    /// SET 产生的变更，订阅者由派发任务在出队时解析
    Changed {
        key: String,
        value: String,
        origin: u64,
    },
    /// key 过期或被删除，受影响会话在退订时已经拿到
    Removed { key: String, targets: Vec<u64> },
}

impl Event {
    fn key(&self) -> &str {
        match self {
            Event::Changed { key, .. } => key,
            Event::Removed { key, .. } => key,
        }
    }
}

/// 发布句柄：事件队列的发送端
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Event>,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl Notifier {
    /// SET 之后发布变更事件，送达与否不影响调用方
    pub async fn changed(&self, key: &str, value: &str, origin: u64) {
        self.publish(Event::Changed {
            key: key.to_string(),
            value: value.to_string(),
            origin,
        })
        .await;
    }

    /// key 被移除（过期或删除）后，向当时的订阅者推送空值通知
    pub async fn removed(&self, key: &str, targets: Vec<u64>) {
        if targets.is_empty() {
            return;
        }
        self.publish(Event::Removed {
            key: key.to_string(),
            targets,
        })
        .await;
    }

    // 限时入队：队列持续打满时放弃这一条，只丢通知不丢数据
    async fn publish(&self, event: Event) {
        match self.tx.send_timeout(event, self.timeout).await {
            Ok(()) => {
                self.metrics.events_published.fetch_add(1, Ordering::Relaxed);
            }
            Err(SendTimeoutError::Timeout(event)) => {
                self.metrics.events_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("event queue full, notification for '{}' dropped", event.key());
            }
            Err(SendTimeoutError::Closed(event)) => {
                debug!("dispatcher gone, notification for '{}' discarded", event.key());
            }
        }
    }
}

/// 建立事件队列并启动派发任务，返回发布句柄
pub fn start_dispatcher(
    subs: SubscriptionManager,
    sessions: SessionRegistry,
    metrics: Arc<Metrics>,
    queue_size: usize,
    publish_timeout: Duration,
    notify_self: bool,
) -> Notifier {
    let (tx, rx) = mpsc::channel(queue_size);
    tokio::spawn(dispatch_loop(
        rx,
        subs,
        sessions,
        metrics.clone(),
        notify_self,
    ));
    Notifier {
        tx,
        timeout: publish_timeout,
        metrics,
    }
}

/// 派发主循环：逐个取事件，先解析订阅者并放开全部锁，再写各会话队列
async fn dispatch_loop(
    mut rx: mpsc::Receiver<Event>,
    subs: SubscriptionManager,
    sessions: SessionRegistry,
    metrics: Arc<Metrics>,
    notify_self: bool,
) {
    while let Some(event) = rx.recv().await {
        match event {
            Event::Changed { key, value, origin } => {
                let line = protocol::kv_line(&key, &value);
                for target in subs.targets_for(&key) {
                    if !notify_self && target == origin {
                        continue;
                    }
                    push_to(&sessions, &metrics, target, line.clone());
                }
            }
            Event::Removed { key, targets } => {
                let line = protocol::kv_line(&key, "");
                for target in targets {
                    push_to(&sessions, &metrics, target, line.clone());
                }
            }
        }
    }
    debug!("dispatch loop stopped");
}

// 往单个会话的出站队列塞一行，满了丢这一条并计数，绝不等待
fn push_to(sessions: &SessionRegistry, metrics: &Metrics, target: u64, line: String) {
    let Some(tx) = sessions.sender(target) else {
        // 会话已下线，解析目标与发送之间的正常竞争
        return;
    };
    match tx.try_send(line) {
        Ok(()) => {
            metrics.pushes_sent.fetch_add(1, Ordering::Relaxed);
        }
        Err(TrySendError::Full(_)) => {
            metrics.pushes_dropped.fetch_add(1, Ordering::Relaxed);
            warn!("session {} outbound queue full, push dropped", target);
        }
        Err(TrySendError::Closed(_)) => {
            debug!("session {} closed, push discarded", target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_millis(500);

    fn addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    struct Fixture {
        subs: SubscriptionManager,
        sessions: SessionRegistry,
        metrics: Arc<Metrics>,
        notifier: Notifier,
    }

    fn fixture(notify_self: bool) -> Fixture {
        let subs = SubscriptionManager::new();
        let sessions = SessionRegistry::new();
        let metrics = Arc::new(Metrics::new());
        let notifier = start_dispatcher(
            subs.clone(),
            sessions.clone(),
            metrics.clone(),
            16,
            Duration::from_millis(50),
            notify_self,
        );
        Fixture {
            subs,
            sessions,
            metrics,
            notifier,
        }
    }

    async fn recv(rx: &mut mpsc::Receiver<String>) -> String {
        timeout(WAIT, rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_changed_event_reaches_subscriber() {
        let f = fixture(true);
        let (tx, mut rx) = mpsc::channel(16);
        let id = f.sessions.register(addr(), tx);
        f.subs.subscribe("foo", id);

        f.notifier.changed("foo", "bar", 999).await;

        assert_eq!(recv(&mut rx).await, "foo bar\n");
        assert_eq!(f.metrics.pushes_sent.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_same_key_delivered_in_set_order() {
        let f = fixture(true);
        let (tx, mut rx) = mpsc::channel(16);
        let id = f.sessions.register(addr(), tx);
        f.subs.subscribe("foo", id);

        f.notifier.changed("foo", "v1", 999).await;
        f.notifier.changed("foo", "v2", 999).await;
        f.notifier.changed("foo", "v3", 999).await;

        assert_eq!(recv(&mut rx).await, "foo v1\n");
        assert_eq!(recv(&mut rx).await, "foo v2\n");
        assert_eq!(recv(&mut rx).await, "foo v3\n");
    }

    #[tokio::test]
    async fn test_fanout_to_all_subscribers() {
        let f = fixture(true);
        let (tx_a, mut rx_a) = mpsc::channel(16);
        let (tx_b, mut rx_b) = mpsc::channel(16);
        let a = f.sessions.register(addr(), tx_a);
        let b = f.sessions.register(addr(), tx_b);
        f.subs.subscribe("foo", a);
        f.subs.subscribe("foo", b);

        f.notifier.changed("foo", "bar", 999).await;

        assert_eq!(recv(&mut rx_a).await, "foo bar\n");
        assert_eq!(recv(&mut rx_b).await, "foo bar\n");
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_block_others() {
        let f = fixture(true);
        // 慢会话：队列容量 1，第二条开始装不下
        let (tx_slow, _rx_slow) = mpsc::channel(1);
        let (tx_ok, mut rx_ok) = mpsc::channel(16);
        let slow = f.sessions.register(addr(), tx_slow);
        let ok = f.sessions.register(addr(), tx_ok);
        f.subs.subscribe("foo", slow);
        f.subs.subscribe("foo", ok);

        f.notifier.changed("foo", "v1", 999).await;
        f.notifier.changed("foo", "v2", 999).await;

        // 正常会话两条都到，慢会话只占了一条、另一条被丢弃
        assert_eq!(recv(&mut rx_ok).await, "foo v1\n");
        assert_eq!(recv(&mut rx_ok).await, "foo v2\n");
        assert_eq!(f.metrics.pushes_dropped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_origin_session_receives_own_change_by_default() {
        let f = fixture(true);
        let (tx, mut rx) = mpsc::channel(16);
        let id = f.sessions.register(addr(), tx);
        f.subs.subscribe("foo", id);

        f.notifier.changed("foo", "bar", id).await;

        assert_eq!(recv(&mut rx).await, "foo bar\n");
    }

    #[tokio::test]
    async fn test_notify_self_disabled_skips_origin() {
        let f = fixture(false);
        let (tx_a, mut rx_a) = mpsc::channel(16);
        let (tx_b, mut rx_b) = mpsc::channel(16);
        let a = f.sessions.register(addr(), tx_a);
        let b = f.sessions.register(addr(), tx_b);
        f.subs.subscribe("foo", a);
        f.subs.subscribe("foo", b);

        f.notifier.changed("foo", "bar", a).await;

        assert_eq!(recv(&mut rx_b).await, "foo bar\n");
        assert!(timeout(Duration::from_millis(100), rx_a.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_removed_event_pushes_empty_value() {
        let f = fixture(true);
        let (tx, mut rx) = mpsc::channel(16);
        let id = f.sessions.register(addr(), tx);

        // 目标列表来自退订方，不再查注册表
        f.notifier.removed("foo", vec![id]).await;

        assert_eq!(recv(&mut rx).await, "foo \n");
    }

    #[tokio::test]
    async fn test_removed_with_no_targets_is_noop() {
        let f = fixture(true);
        f.notifier.removed("foo", Vec::new()).await;
        assert_eq!(f.metrics.events_published.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_push_to_unknown_session_is_skipped() {
        let f = fixture(true);
        f.subs.subscribe("foo", 42);

        // 会话 42 从未注册，事件被安静跳过
        f.notifier.changed("foo", "bar", 999).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.metrics.pushes_sent.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_publish_times_out_when_queue_stays_full() {
        // 直接构造一个没有消费者的队列来逼出超时
        let (tx, _rx) = mpsc::channel(1);
        let metrics = Arc::new(Metrics::new());
        let notifier = Notifier {
            tx,
            timeout: Duration::from_millis(20),
            metrics: metrics.clone(),
        };

        notifier.changed("foo", "v1", 1).await;
        notifier.changed("foo", "v2", 1).await;

        assert_eq!(metrics.events_published.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.events_dropped.load(Ordering::Relaxed), 1);
    }
}
