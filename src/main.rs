// src/main.rs
use std::path::PathBuf;

use clap::Parser;
use tidekv::{config, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tidekv", version, about = "带 TTL 与订阅推送的内存 KV 服务")]
struct Cli {
    /// 配置文件路径，不存在时会生成默认配置
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// 监听地址，优先于配置文件里的 addr
    #[arg(short, long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tidekv=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load(&cli.config)?;
    if let Some(addr) = cli.addr {
        cfg.addr = addr;
    }

    // 启动 TCP 服务；绑定失败会带着上下文一路冒回来，以非零退出
    server::start(cfg).await?;
    Ok(())
}
