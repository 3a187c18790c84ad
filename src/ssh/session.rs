// SSH 会话管理
// 认证完成后的会话对象：在同一连接上打开 direct-streamlocal 通道转发到远程 Unix socket

use std::fmt;

use async_trait::async_trait;
use russh::client::{Handle, Msg};
use russh::{ChannelStream, Disconnect};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::handler::SshClientHandler;
use crate::error::{Result, TunnelError};
use crate::tunnel::Tunnel;

/// 转发到远程 Unix socket 的通道（字节流）
pub type ForwardedSocket = ChannelStream<Msg>;

/// SSH 会话（认证成功后）
/// 一个会话可复用打开多个通道，无需重新认证
pub struct SshSession {
    handle: Handle<SshClientHandler>,
    /// 远程地址（用于日志）
    addr: String,
}

impl fmt::Debug for SshSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshSession").field("addr", &self.addr).finish()
    }
}

impl SshSession {
    pub fn new(handle: Handle<SshClientHandler>, addr: String) -> Self {
        Self { handle, addr }
    }

    /// 打开到远程 Unix socket 的转发通道
    pub async fn open_forwarded_socket(&self, remote_socket_path: &str) -> Result<ForwardedSocket> {
        debug!("Opening direct-streamlocal channel to {}", remote_socket_path);

        let channel = self
            .handle
            .channel_open_direct_streamlocal(remote_socket_path)
            .await
            .map_err(|e| TunnelError::SocketUnavailable {
                path: remote_socket_path.to_string(),
                reason: match e {
                    russh::Error::ChannelOpenFailure(reason) => {
                        format!("remote refused channel: {:?}", reason)
                    }
                    other => other.to_string(),
                },
            })?;

        debug!("Channel {} opened", channel.id());
        Ok(channel.into_stream())
    }

    /// 关闭会话
    pub async fn close(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(TunnelError::from)
    }
}

#[async_trait]
impl Tunnel for SshSession {
    type Socket = ForwardedSocket;

    async fn open_forwarded_socket(&self, remote_path: &str) -> Result<ForwardedSocket> {
        SshSession::open_forwarded_socket(self, remote_path).await
    }

    async fn close_socket(&self, mut socket: ForwardedSocket) {
        // 发送 EOF，随后 drop 关闭通道
        if let Err(e) = socket.shutdown().await {
            debug!("Channel shutdown on {}: {}", self.addr, e);
        }
    }

    async fn close(self) {
        let addr = self.addr.clone();
        if let Err(e) = SshSession::close(self).await {
            warn!("Failed to close session {}: {}", addr, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::ssh::client::SshClient;
    use crate::ssh::config::{HostVerification, TransportConfig};
    use crate::test_support::{TestSshServer, ED25519_PRIVATE};

    const SOCKET: &str = "/run/podman/podman.sock";

    async fn connect(server: &TestSshServer) -> SshSession {
        let addr = server.spawn().await;
        let config = TransportConfig {
            principal: "admin".into(),
            credential: Arc::new(russh::keys::decode_secret_key(ED25519_PRIVATE, None).unwrap()),
            host_verification: HostVerification::Skip,
            dial_timeout: Duration::from_secs(5),
        };
        SshClient::new().connect(&addr.to_string(), &config).await.unwrap()
    }

    #[tokio::test]
    async fn test_refused_forward_is_socket_unavailable() {
        let server = TestSshServer::new(SOCKET, b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        let session = connect(&server).await;

        match session
            .open_forwarded_socket("/run/user/1000/podman/podman.sock")
            .await
        {
            Err(TunnelError::SocketUnavailable { path, reason }) => {
                assert_eq!(path, "/run/user/1000/podman/podman.sock");
                assert!(reason.starts_with("remote refused channel"), "{reason}");
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("forward to an unserved socket was accepted"),
        }
        assert!(server.saw("refused:/run/user/1000/podman/podman.sock"));

        // 会话在通道被拒后仍可用
        let socket = session.open_forwarded_socket(SOCKET).await.unwrap();
        Tunnel::close_socket(&session, socket).await;
        Tunnel::close(session).await;
        assert!(server.wait_for("disconnected").await);
    }

    #[tokio::test]
    async fn test_close_sends_eof_then_disconnects() {
        let server = TestSshServer::new(SOCKET, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n[]");
        let session = connect(&server).await;

        let mut socket = session.open_forwarded_socket(SOCKET).await.unwrap();
        socket.write_all(b"GET /_ping HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        let mut response = Vec::new();
        while !response.ends_with(b"[]") {
            let mut buf = [0u8; 256];
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "channel closed early");
            response.extend_from_slice(&buf[..n]);
        }
        assert!(response.starts_with(b"HTTP/1.1 200 OK"));

        Tunnel::close_socket(&session, socket).await;
        assert!(server.wait_for("socket_closed").await);
        assert!(!server.saw("disconnected"));

        Tunnel::close(session).await;
        assert!(server.wait_for("disconnected").await);
        assert_eq!(
            server.events().last().map(String::as_str),
            Some("disconnected")
        );
    }
}
