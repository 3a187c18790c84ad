//! 隧道抽象
//!
//! `Connector` 建立已认证的会话，`Tunnel` 在会话上打开到远程 Unix socket 的字节流。
//! 生产实现是 [`crate::ssh::SshClient`] / [`crate::ssh::SshSession`]；测试中用
//! `tokio::io::duplex` 替身。

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::ssh::TransportConfig;

/// 建立会话
#[async_trait]
pub trait Connector: Send + Sync {
    type Tunnel: Tunnel;

    async fn connect(&self, addr: &str, config: &TransportConfig) -> Result<Self::Tunnel>;
}

/// 已建立的会话
#[async_trait]
pub trait Tunnel: Send + Sync + Sized {
    type Socket: AsyncRead + AsyncWrite + Unpin + Send;

    /// 打开转发通道（可多次调用，复用同一会话）
    async fn open_forwarded_socket(&self, remote_path: &str) -> Result<Self::Socket>;

    /// 关闭转发通道
    async fn close_socket(&self, socket: Self::Socket);

    /// 关闭会话
    async fn close(self);
}
