// src/app.rs
//! 全局共享状态：存储、订阅注册表、会话注册表、通知句柄、监控与配置。
//! 各连接任务共享同一份，Clone 只是句柄复制。

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::engine::{Store, SubscriptionManager};
use crate::monitor::Monitor;
use crate::notify::{self, Notifier};
use crate::session::SessionRegistry;

#[derive(Clone)]
pub struct App {
    pub store: Store,
    pub subs: SubscriptionManager,
    pub sessions: SessionRegistry,
    pub notifier: Notifier,
    pub monitor: Monitor,
    pub cfg: Arc<Config>,
}

impl App {
    /// 组装全部组件并启动派发任务。要求已在 tokio runtime 内。
    pub fn new(cfg: Config) -> Self {
        let store = Store::new();
        let subs = SubscriptionManager::new();
        let sessions = SessionRegistry::new();
        let monitor = Monitor::new(cfg.slowlog_threshold_ms);
        let notifier = notify::start_dispatcher(
            subs.clone(),
            sessions.clone(),
            monitor.metrics.clone(),
            cfg.event_queue_size,
            Duration::from_millis(cfg.publish_timeout_ms),
            cfg.notify_self,
        );
        App {
            store,
            subs,
            sessions,
            notifier,
            monitor,
            cfg: Arc::new(cfg),
        }
    }

    /// key 从存储消失（过期或删除）后的订阅收尾：
    /// 清掉它的全部订阅，按配置向原订阅者推送空值通知。
    /// 惰性过期、DEL、后台清扫三条路径共用，幂等。
    pub async fn retire_key(&self, key: &str) {
        let targets = self.subs.unsubscribe_all(key);
        if self.cfg.notify_expired && !targets.is_empty() {
            self.notifier.removed(key, targets).await;
        }
    }
}
