// src/monitor/mod.rs
//! 监控与诊断模块
pub mod info;
mod slowlog;
mod metrics;
mod http;

use std::sync::Arc;
use std::time::{Instant, Duration};

pub use slowlog::SlowLog;
pub use metrics::Metrics;
pub use http::serve_metrics;

/// 监控系统主结构
#[derive(Clone)]
pub struct Monitor {
    pub slow_log: Arc<SlowLog>,
    pub metrics: Arc<Metrics>,
}

impl Monitor {
    pub fn new(slowlog_threshold_ms: u64) -> Self {
        Monitor {
            slow_log: Arc::new(SlowLog::new(128, Duration::from_millis(slowlog_threshold_ms))),
            metrics: Arc::new(Metrics::new()),
        }
    }
}

/// 慢日志条目
#[derive(Debug, Clone)]
pub struct SlowLogEntry {
    pub timestamp: Instant,
    pub duration: Duration,
    pub command: String,
    pub client_addr: String,
}
