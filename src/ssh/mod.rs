// SSH 连接模块
//
// 模块结构:
// - ssh_config: ~/.ssh/config 解析
// - resolver: 主机别名解析 (HostResolver, SshPaths)
// - known_hosts: known_hosts 加载与校验
// - config: 连接配置 (HostConfig, TransportConfig) 与认证配置构建
// - handler: russh Handler 实现（主机密钥校验）
// - client: SSH 客户端核心（拨号、握手、认证）
// - session: SSH 会话（转发通道）

pub mod client;
pub mod config;
pub mod handler;
pub mod known_hosts;
pub mod resolver;
pub mod session;
pub mod ssh_config;

// 公开导出
pub use client::SshClient;
pub use config::{build_transport_config, HostConfig, HostVerification, TransportConfig};
pub use known_hosts::{HostKeyCheck, KnownHosts};
pub use resolver::{HostResolver, SshPaths};
pub use session::{ForwardedSocket, SshSession};
