// SSH 客户端 Handler 实现
// 实现 russh::client::Handler trait，握手时按策略校验服务器公钥

use std::future::Future;

use russh::keys::{HashAlg, PublicKey};
use tracing::{debug, info, warn};

use super::config::HostVerification;
use super::known_hosts::HostKeyCheck;
use crate::error::TunnelError;

/// SSH 客户端 Handler
pub struct SshClientHandler {
    /// 服务器主机名（用于 known_hosts 查找）
    host: String,
    port: u16,
    verification: HostVerification,
}

impl SshClientHandler {
    pub fn new(host: String, port: u16, verification: HostVerification) -> Self {
        Self {
            host,
            port,
            verification,
        }
    }

    fn check(&self, server_public_key: &PublicKey) -> Result<bool, TunnelError> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256);
        debug!(
            "Server key: {} {}",
            server_public_key.algorithm().as_str(),
            fingerprint
        );

        let known = match &self.verification {
            HostVerification::Skip => {
                warn!(
                    "Accepting unverified host key for {}:{} ({})",
                    self.host, self.port, fingerprint
                );
                return Ok(true);
            }
            HostVerification::KnownHosts(known) => known,
        };

        let reason = match known.verify(&self.host, self.port, server_public_key) {
            HostKeyCheck::Trusted => {
                info!("Host key verified for {}:{}", self.host, self.port);
                return Ok(true);
            }
            HostKeyCheck::Unknown => format!(
                "no entry in {} for this host (presented {})",
                known.path().display(),
                fingerprint
            ),
            HostKeyCheck::Changed { line } => format!(
                "key differs from {} line {} (presented {}); possible man-in-the-middle",
                known.path().display(),
                line,
                fingerprint
            ),
            HostKeyCheck::Revoked { line } => format!(
                "presented key {} is revoked at {} line {}",
                fingerprint,
                known.path().display(),
                line
            ),
        };

        warn!("Host key rejected for {}:{}: {}", self.host, self.port, reason);
        Err(TunnelError::HostKeyMismatch {
            host: format!("{}:{}", self.host, self.port),
            reason,
        })
    }
}

impl russh::client::Handler for SshClientHandler {
    type Error = TunnelError;

    /// 检查服务器公钥
    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        let result = self.check(server_public_key);
        async move { result }
    }
}
