// src/expire.rs
//! 过期清理：
//! - 固定周期扫描存储，删除已过期的条目
//! - 对每个被删的 key 做订阅收尾，并按配置推送空值通知
//! - sweep 返回后存储锁已放开，才逐 key 去碰注册表

use std::sync::atomic::Ordering;
use tokio::time::{Duration, interval};
use tracing::debug;

use crate::app::App;

/// 后台定时清理任务，随进程一直运行。
/// 单次 tick 自包含：没有可失败的操作，通知侧的丢弃在派发句柄里消化。
pub async fn start_reaper(app: App, every: Duration) {
    let mut iv = interval(every);
    loop {
        iv.tick().await;

        let removed = app.store.sweep();
        if removed.is_empty() {
            continue;
        }
        app.monitor
            .metrics
            .keys_expired
            .fetch_add(removed.len() as u64, Ordering::Relaxed);
        debug!("sweep removed {} expired key(s)", removed.len());

        for key in removed {
            app.retire_key(&key).await;
        }
    }
}
