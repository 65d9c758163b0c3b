// src/client.rs
//! tidekv 进程内客户端 SDK：
//! - 一条 TCP 连接，一个后台读任务
//! - GET 按键匹配回复，订阅推送按键派发给回调
//! - SET / SUBSCRIBE / UNSUBSCRIBE 都是发完即走
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, oneshot},
};
use tracing::debug;

/// 订阅回调：参数是该键的最新值（键被删除或过期时为空串）
pub type Callback = Arc<dyn Fn(String) + Send + Sync>;

/// 客户端句柄。内部全是 Arc，可以随意 clone 给多个任务用。
#[derive(Clone)]
pub struct KvClient {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    /// key -> 订阅回调
    subscriptions: Arc<DashMap<String, Callback>>,
    /// key -> 等待中的 GET；同一个键同时只挂一个等待者
    pending: Arc<DashMap<String, oneshot::Sender<String>>>,
    default_ttl: Option<i64>,
}

impl KvClient {
    /// 连接服务端，不带默认 TTL
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_inner(addr, None).await
    }

    /// 连接服务端，之后 `set` 不显式给 TTL 时用这里的默认值
    pub async fn connect_with_ttl(addr: &str, default_ttl: i64) -> Result<Self> {
        Self::connect_inner(addr, Some(default_ttl)).await
    }

    async fn connect_inner(addr: &str, default_ttl: Option<i64>) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("failed to connect to {}", addr))?;
        let (reader, writer) = stream.into_split();

        let client = Self {
            writer: Arc::new(Mutex::new(writer)),
            subscriptions: Arc::new(DashMap::new()),
            pending: Arc::new(DashMap::new()),
            default_ttl,
        };

        tokio::spawn(read_loop(
            reader,
            client.subscriptions.clone(),
            client.pending.clone(),
        ));

        Ok(client)
    }

    /// 写入键值。`ttl` 为 None 时退回默认 TTL；两者都没有就不带过期。
    pub async fn set(&self, key: &str, value: &str, ttl: Option<i64>) -> Result<()> {
        let line = match ttl.or(self.default_ttl) {
            Some(secs) => format!("SET {} {} {}\n", key, value, secs),
            None => format!("SET {} {}\n", key, value),
        };
        self.send(&line).await
    }

    /// 读取键值。键不存在（或已过期）返回 None。
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(key.to_string(), tx);
        self.send(&format!("GET {}\n", key)).await?;

        let value = rx
            .await
            .context("connection closed before the reply arrived")?;
        Ok(if value.is_empty() { None } else { Some(value) })
    }

    /// 订阅一个键：登记回调，并告诉服务端以后这个键的变更要推给我
    pub async fn subscribe<F>(&self, key: &str, callback: F) -> Result<()>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.subscriptions
            .insert(key.to_string(), Arc::new(callback));
        self.send(&format!("SUBSCRIBE {}\n", key)).await
    }

    /// 取消订阅：摘掉回调并通知服务端
    pub async fn unsubscribe(&self, key: &str) -> Result<()> {
        self.subscriptions.remove(key);
        self.send(&format!("UNSUBSCRIBE {}\n", key)).await
    }

    async fn send(&self, line: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .context("failed to write to server")?;
        Ok(())
    }
}

/// 后台读任务：服务端下行的每一行都是 `<key> <value>`。
/// 先看这个键有没有挂着的 GET，有就是回复；否则按订阅回调派发。
async fn read_loop(
    reader: OwnedReadHalf,
    subscriptions: Arc<DashMap<String, Callback>>,
    pending: Arc<DashMap<String, oneshot::Sender<String>>>,
) {
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("server closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("read failed: {}", e);
                break;
            }
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        let Some((key, value)) = trimmed.split_once(' ') else {
            // ERR / PONG / OK 这类单段回复没有挂起的等待者，直接略过
            debug!("unmatched line from server: {}", trimmed);
            continue;
        };

        if let Some((_, tx)) = pending.remove(key) {
            // 等待者可能已经超时放弃了，发送失败不算错
            let _ = tx.send(value.to_string());
            continue;
        }

        // 先把回调 clone 出来再调用，不在 DashMap 的守卫里执行用户代码
        let callback = subscriptions.get(key).map(|cb| cb.value().clone());
        if let Some(cb) = callback {
            cb(value.to_string());
        }
    }

    // 连接断了，唤醒所有还在等 GET 回复的调用方
    pending.clear();
}
