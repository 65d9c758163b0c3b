// src/engine/mod.rs

//! # 引擎模块
//!
//! `engine` 是服务的核心。它：
//! - 从网络层接收已分词的命令（`&[String]`）。
//! - 操作内存存储（`store`）与订阅注册表（`subscribe`）。
//! - SET 之后向派发队列发布变更事件；key 消失时做订阅收尾。
//! - 返回要写回客户端的完整回复（含换行），`None` 表示该命令无回复。
pub mod store;
pub mod subscribe;

pub use store::{Entry, Lookup, Store};
pub use subscribe::SubscriptionManager;

use std::time::Duration;

use crate::app::App;
use crate::monitor::info;
use crate::protocol;

fn line(body: &str) -> Option<String> {
    Some(format!("{}\n", body))
}

/// 执行单个客户端命令
///
/// # 参数
///
/// * `parts` - 命令名称及其参数
/// * `app` - 全局共享状态
/// * `session_id` - 发起命令的会话，用作变更事件的 origin
pub async fn execute(parts: &[String], app: &App, session_id: u64) -> Option<String> {
    // 1. 空白命令检查
    if parts.is_empty() {
        return line("ERR empty command");
    }

    // 2. 关键字大小写不敏感，参数原样使用
    let cmd = parts[0].to_uppercase();

    match cmd.as_str() {
        "SET" => {
            // SET <key> <value> [ttl-seconds]，-1 或省略表示永不过期
            if parts.len() != 3 && parts.len() != 4 {
                return line(&protocol::wrong_args("SET", protocol::SET_USAGE));
            }
            let ttl = match parts.get(3) {
                Some(raw) => match raw.parse::<i64>() {
                    Ok(secs) if secs > 0 => Some(Duration::from_secs(secs as u64)),
                    // 0 与负数等同于省略
                    Ok(_) => None,
                    Err(_) => {
                        return line(&format!(
                            "ERR value is not an integer or out of range (usage: {})",
                            protocol::SET_USAGE
                        ));
                    }
                },
                None => None,
            };
            app.store.set(&parts[1], &parts[2], ttl);
            app.notifier.changed(&parts[1], &parts[2], session_id).await;
            None
        }

        "GET" => {
            // 回复 <key> <value>，不存在或已过期时 value 为空
            if parts.len() != 2 {
                return line(&protocol::wrong_args("GET", protocol::GET_USAGE));
            }
            match app.store.lookup(&parts[1]) {
                Lookup::Found { value, .. } => Some(protocol::kv_line(&parts[1], &value)),
                Lookup::Expired => {
                    // 惰性过期已删掉条目，这里补上订阅收尾
                    app.retire_key(&parts[1]).await;
                    Some(protocol::kv_line(&parts[1], ""))
                }
                Lookup::Missing => Some(protocol::kv_line(&parts[1], "")),
            }
        }

        "DEL" => {
            if parts.len() != 2 {
                return line(&protocol::wrong_args("DEL", protocol::DEL_USAGE));
            }
            if app.store.remove(&parts[1]) {
                app.retire_key(&parts[1]).await;
            }
            None
        }

        "TTL" => {
            // TTL <key>: 剩余秒数，-1 永不过期，-2 不存在
            if parts.len() != 2 {
                return line(&protocol::wrong_args("TTL", protocol::TTL_USAGE));
            }
            match app.store.lookup(&parts[1]) {
                Lookup::Found { remaining, .. } => {
                    let secs = match remaining {
                        Some(d) => (((d.as_millis() + 999) / 1000) as i64).to_string(),
                        None => "-1".to_string(),
                    };
                    Some(protocol::kv_line(&parts[1], &secs))
                }
                Lookup::Expired => {
                    app.retire_key(&parts[1]).await;
                    Some(protocol::kv_line(&parts[1], "-2"))
                }
                Lookup::Missing => Some(protocol::kv_line(&parts[1], "-2")),
            }
        }

        "SUBSCRIBE" => {
            if parts.len() != 2 {
                return line(&protocol::wrong_args("SUBSCRIBE", protocol::SUBSCRIBE_USAGE));
            }
            app.subs.subscribe(&parts[1], session_id);
            None
        }

        "UNSUBSCRIBE" => {
            if parts.len() != 2 {
                return line(&protocol::wrong_args(
                    "UNSUBSCRIBE",
                    protocol::UNSUBSCRIBE_USAGE,
                ));
            }
            app.subs.unsubscribe(&parts[1], session_id);
            None
        }

        // --- 连接与诊断命令 ---
        "PING" => {
            // 健康检查，总是返回 PONG
            line("PONG")
        }
        "QUIT" => {
            // 返回 OK，由网络层负责结束会话
            line("OK")
        }
        "INFO" => {
            if parts.len() > 2 {
                return line(&protocol::wrong_args("INFO", protocol::INFO_USAGE));
            }
            let report = info::build_info_response(parts.get(1).map(|s| s.as_str()), app);
            line(report.trim_end())
        }
        "CLIENTS" => {
            let listing = app.sessions.list();
            line(listing.trim_end())
        }
        "SLOWLOG" => {
            let logs = app.monitor.slow_log.get_logs();
            if logs.is_empty() {
                line("(empty)")
            } else {
                line(logs.trim_end())
            }
        }

        // --- 未知命令 ---
        other => line(&format!("ERR unknown command '{}'", other)),
    }
}
