// src/server.rs
//! tidekv 服务的网络层：
//! - 监听 TCP 连接，绑定失败让进程以错误退出
//! - 每个连接一个读任务 + 一个写任务，出站队列串起回复与推送
//! - 解析行协议后调度到 engine 执行
//! - 断开时注销会话并清掉它的全部订阅
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::{app::App, config::Config, engine, expire, monitor, protocol};

/// 默认入口：绑定地址、组装组件、拉起后台任务并进入接受循环
pub async fn start(cfg: Config) -> Result<()> {
    let listener = TcpListener::bind(&cfg.addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.addr))?;
    info!("tidekv listening on {}", cfg.addr);

    let app = App::new(cfg);

    // 后台任务：过期清理 + 可选的 metrics 端点
    tokio::spawn(expire::start_reaper(
        app.clone(),
        Duration::from_secs(app.cfg.sweep_interval_secs),
    ));
    if app.cfg.metrics_enabled {
        tokio::spawn(monitor::serve_metrics(
            app.monitor.metrics.clone(),
            app.cfg.metrics_port,
        ));
    }

    serve(listener, app).await
}

/// 接受循环：不断 accept 新连接并 spawn 出去一个异步任务。
/// accept 失败只记日志，不拖垮整个服务。
pub async fn serve(listener: TcpListener, app: App) -> Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("accept failed: {}", e);
                continue;
            }
        };
        debug!("accepted connection from {}", peer);

        let app = app.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, app).await {
                warn!("connection error: {}", err);
            }
        });
    }
}

/// 单个连接的处理逻辑
/// - 注册会话拿到稳定的会话 ID
/// - 把流拆成 reader / writer，写半边交给独立的写任务
/// - 循环读行、执行、把回复塞进出站队列
/// - 无论怎么退出都注销会话并清订阅
async fn handle_connection(stream: TcpStream, app: App) -> Result<()> {
    let peer = stream.peer_addr()?;
    let (reader, writer) = stream.into_split();

    // 出站队列：命令回复与订阅推送都走这里，由写任务统一按序落到 socket
    let (out_tx, out_rx) = mpsc::channel::<String>(app.cfg.session_queue_size);
    let session_id = app.sessions.register(peer, out_tx.clone());
    app.monitor
        .metrics
        .connected_clients
        .fetch_add(1, Ordering::Relaxed);
    app.monitor
        .metrics
        .total_connections
        .fetch_add(1, Ordering::Relaxed);
    tokio::spawn(write_loop(writer, out_rx));

    let result = read_loop(reader, &out_tx, &app, session_id, peer).await;

    // 会话收尾。出站发送端随本函数返回而关闭，写任务排空后自行退出。
    app.sessions.unregister(session_id);
    app.subs.unsubscribe_session(session_id);
    app.monitor
        .metrics
        .connected_clients
        .fetch_sub(1, Ordering::Relaxed);
    debug!("session {} ({}) closed", session_id, peer);

    result
}

async fn read_loop(
    reader: OwnedReadHalf,
    out: &mpsc::Sender<String>,
    app: &App,
    session_id: u64,
    peer: SocketAddr,
) -> Result<()> {
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            // EOF：对端正常关闭
            Ok(0) => {
                debug!("{} disconnected", peer);
                break;
            }
            Ok(_) => {}
            Err(e)
                if e.kind() == ErrorKind::UnexpectedEof
                    || e.kind() == ErrorKind::ConnectionReset =>
            {
                debug!("{} disconnected: {}", peer, e);
                break;
            }
            // 其它 I/O 错误：结束这个会话，外层做收尾
            Err(e) => return Err(e.into()),
        }

        let parts = protocol::tokenize(&line);
        if parts.is_empty() {
            continue;
        }
        let cmd = parts[0].to_uppercase();
        app.monitor.metrics.record_command(&cmd);
        app.sessions.update_command(session_id, &cmd);

        let started = Instant::now();
        let reply = engine::execute(&parts, app, session_id).await;
        app.monitor
            .slow_log
            .add_entry(line.trim_end(), started.elapsed(), &peer.to_string());

        if let Some(payload) = reply {
            // 写任务已退出说明连接废了，直接收尾
            if out.send(payload).await.is_err() {
                break;
            }
        }
        if cmd == "QUIT" {
            break;
        }
    }

    Ok(())
}

/// 写任务：独占写半边，把出站队列里的行按序写到 socket
async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<String>) {
    while let Some(payload) = rx.recv().await {
        if let Err(e) = writer.write_all(payload.as_bytes()).await {
            debug!("write failed: {}", e);
            break;
        }
    }
}
