use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::Path
};
use anyhow::{Context, Result};
use serde_json;
use tracing::{info, warn};

/// 进程启动后，从 config.json 中读到的全局配置
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// 监听地址
    pub addr: String,
    /// 过期清扫周期（秒）
    pub sweep_interval_secs: u64,
    /// 全局事件队列容量
    pub event_queue_size: usize,
    /// 单会话出站队列容量
    pub session_queue_size: usize,
    /// 事件入队的阻塞上限（毫秒），超时丢弃该通知
    pub publish_timeout_ms: u64,
    /// SET 是否回推给发起会话自身
    pub notify_self: bool,
    /// key 过期/删除时是否向订阅者推送空值通知
    pub notify_expired: bool,
    // 监控配置
    pub metrics_enabled: bool,
    pub metrics_port: u16,
    pub slowlog_threshold_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: "127.0.0.1:6969".to_string(),
            sweep_interval_secs: 1,
            event_queue_size: 1024,
            session_queue_size: 64,
            publish_timeout_ms: 50,
            notify_self: true,
            notify_expired: true,
            metrics_enabled: true,
            metrics_port: 9090,
            slowlog_threshold_ms: 10,
        }
    }
}

/// 从指定路径读取并反序列化 JSON 配置
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();

    // 如果配置文件不存在，创建默认配置
    if !path_ref.exists() {
        info!("Config file not found, creating default configuration...");

        let default_cfg = Config::default();

        let default_json = serde_json::to_string_pretty(&default_cfg)?;
        fs::write(path_ref, default_json)
            .with_context(|| format!("Failed to write default config to {:?}", path_ref))?;
        info!("Default config created at {:?}", path_ref);

        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {:?}", path.as_ref()))?;
    let cfg: Config = serde_json::from_str(&data)
        .context("Failed to parse config.json")?;
    Ok(sanitize(cfg))
}

// 回填下限。清扫周期和队列容量为 0 会让后台任务在启动后崩掉，
// 这里统一抬到 1 并告警，而不是把坏配置带进运行期。
fn sanitize(mut cfg: Config) -> Config {
    if cfg.sweep_interval_secs == 0 {
        warn!("sweep_interval_secs must be at least 1, using 1");
        cfg.sweep_interval_secs = 1;
    }
    if cfg.event_queue_size == 0 {
        warn!("event_queue_size must be at least 1, using 1");
        cfg.event_queue_size = 1;
    }
    if cfg.session_queue_size == 0 {
        warn!("session_queue_size must be at least 1, using 1");
        cfg.session_queue_size = 1;
    }
    cfg
}
