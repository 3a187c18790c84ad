// podtunnel: 通过 SSH 转发的 Unix socket 调用远程 Podman API
//
// 模块结构:
// - ssh: 主机解析、认证配置、连接与转发通道
// - tunnel: Connector / Tunnel 抽象
// - api: HTTP 请求/响应
// - commands: 命令注册表
// - runner: 调用流水线
// - cli: 命令行参数

pub mod api;
pub mod cli;
pub mod commands;
pub mod constants;
pub mod error;
pub mod runner;
pub mod ssh;
pub mod tunnel;

#[cfg(test)]
mod test_support;

pub use error::{Result, TunnelError};
