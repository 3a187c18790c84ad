// SSH 客户端核心实现
// TCP 拨号 -> SSH 握手（含主机密钥校验）-> 公钥认证，整体受 dial_timeout 约束

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{AuthResult, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use super::config::TransportConfig;
use super::handler::SshClientHandler;
use super::session::SshSession;
use crate::error::{Result, TunnelError};
use crate::tunnel::Connector;

/// SSH 客户端
/// 负责建立 SSH 连接并返回 SshSession
#[derive(Clone, Copy, Debug, Default)]
pub struct SshClient;

impl SshClient {
    pub fn new() -> Self {
        Self
    }

    /// 连接到 host:port 形式的地址
    pub async fn connect(&self, addr: &str, config: &TransportConfig) -> Result<SshSession> {
        let dial_timeout = config.dial_timeout;

        timeout(dial_timeout, self.connect_inner(addr, config))
            .await
            .map_err(|_| TunnelError::Timeout {
                stage: "connect",
                elapsed: dial_timeout,
            })?
    }

    async fn connect_inner(&self, addr: &str, config: &TransportConfig) -> Result<SshSession> {
        let (host, port) = split_addr(addr)?;

        // 阶段 1: TCP 连接
        info!("Connecting to {}...", addr);
        let tcp_stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TunnelError::DialFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        // 忽略失败：仅影响延迟
        let _ = tcp_stream.set_nodelay(true);
        debug!("TCP connection established");

        // 阶段 2: SSH 握手（主机密钥在 handler 中校验）
        let russh_config = Arc::new(config.to_russh_config());
        let handler = SshClientHandler::new(host, port, config.host_verification.clone());

        let mut handle = russh::client::connect_stream(russh_config, tcp_stream, handler).await?;
        debug!("SSH handshake completed");

        // 阶段 3: 认证
        self.authenticate(&mut handle, config).await?;
        info!("Authenticated as '{}'", config.principal);

        Ok(SshSession::new(handle, addr.to_string()))
    }

    /// 公钥认证
    async fn authenticate(
        &self,
        handle: &mut Handle<SshClientHandler>,
        config: &TransportConfig,
    ) -> Result<()> {
        // RSA 密钥需要协商签名哈希（rsa-sha2-256/512），其他算法忽略该参数
        let hash_alg = if config.credential.algorithm().is_rsa() {
            handle.best_supported_rsa_hash().await?.flatten()
        } else {
            None
        };

        let key_with_alg = PrivateKeyWithHashAlg::new(config.credential.clone(), hash_alg);

        let auth_result = handle
            .authenticate_publickey(&config.principal, key_with_alg)
            .await?;

        match auth_result {
            AuthResult::Success => Ok(()),
            AuthResult::Failure {
                remaining_methods,
                partial_success,
            } => {
                if partial_success {
                    return Err(TunnelError::HandshakeFailed(
                        "Partial authentication - additional auth required".to_string(),
                    ));
                }
                Err(TunnelError::HandshakeFailed(format!(
                    "Public key authentication failed for '{}'. Server suggests: {:?}",
                    config.principal, remaining_methods
                )))
            }
        }
    }
}

#[async_trait]
impl Connector for SshClient {
    type Tunnel = SshSession;

    async fn connect(&self, addr: &str, config: &TransportConfig) -> Result<SshSession> {
        SshClient::connect(self, addr, config).await
    }
}

/// 拆分 host:port（支持 [v6]:port），用于 known_hosts 查找
fn split_addr(addr: &str) -> Result<(String, u16)> {
    let malformed = |reason: &str| TunnelError::DialFailed {
        addr: addr.to_string(),
        reason: reason.to_string(),
    };

    if addr.trim().is_empty() {
        return Err(malformed("empty address"));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| malformed("missing port"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(malformed("missing host"));
    }
    let port = port.parse::<u16>().map_err(|_| malformed("invalid port"))?;

    Ok((host.to_string(), port))
}
