// src/lib.rs
//! tidekv 库：protocol / server / engine / notify / expire / session / monitor / client

pub mod app; // 组件装配
pub mod client; // 进程内客户端 SDK
pub mod config; // 配置加载
pub mod engine; // 存储引擎（内存 KV + 订阅表）
pub mod expire; // 过期清理
pub mod monitor; // 监控 & 诊断
pub mod notify; // 变更事件分发
pub mod protocol; // 行协议工具
pub mod server; // 网络层 & 命令分发
pub mod session; // 会话注册表
