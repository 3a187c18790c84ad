// SSH 连接配置
// HostConfig: 从 ~/.ssh/config 解析出的目标主机参数
// TransportConfig: 可直接拨号的传输配置（凭据 + 主机校验策略 + 超时）

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use russh::keys::{HashAlg, PrivateKey};
use tracing::{debug, warn};

use super::known_hosts::KnownHosts;
use crate::error::{Result, TunnelError};

/// 解析后的主机配置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostConfig {
    /// 命令行传入的主机别名
    pub alias: String,
    /// 实际拨号地址
    pub host_name: String,
    /// 端口
    pub port: u16,
    /// 用户名
    pub user: String,
    /// 私钥文件路径
    pub identity_file: PathBuf,
    /// known_hosts 路径
    pub known_hosts: PathBuf,
}

impl HostConfig {
    /// host:port 形式的地址
    pub fn addr(&self) -> String {
        if self.host_name.contains(':') && !self.host_name.starts_with('[') {
            // IPv6 字面量
            format!("[{}]:{}", self.host_name, self.port)
        } else {
            format!("{}:{}", self.host_name, self.port)
        }
    }
}

/// 主机密钥校验策略
#[derive(Clone, Debug)]
pub enum HostVerification {
    /// 不校验（仅用于诊断）
    Skip,
    /// 按 known_hosts 校验
    KnownHosts(Arc<KnownHosts>),
}

/// 准备好的传输配置
#[derive(Clone)]
pub struct TransportConfig {
    /// 认证用户
    pub principal: String,
    /// 签名私钥
    pub credential: Arc<PrivateKey>,
    /// 主机校验策略
    pub host_verification: HostVerification,
    /// 连接 + 握手超时
    pub dial_timeout: Duration,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 不输出私钥内容
        f.debug_struct("TransportConfig")
            .field("principal", &self.principal)
            .field("credential", &self.credential.algorithm().as_str())
            .field("host_verification", &self.host_verification)
            .field("dial_timeout", &self.dial_timeout)
            .finish()
    }
}

impl TransportConfig {
    /// 构建 russh 配置
    pub fn to_russh_config(&self) -> russh::client::Config {
        // 单次调用，不需要心跳；超时由调用方的 timeout() 控制
        russh::client::Config {
            inactivity_timeout: None,
            ..Default::default()
        }
    }
}

/// 构建传输配置（读取私钥、加载 known_hosts），不产生网络 I/O
pub async fn build_transport_config(
    timeout: Duration,
    skip_host_verification: bool,
    host: &HostConfig,
) -> Result<TransportConfig> {
    let credential = load_private_key(&host.identity_file).await?;

    let host_verification = if skip_host_verification {
        warn!(
            "Host key verification disabled for {}; the remote identity will not be checked",
            host.alias
        );
        HostVerification::Skip
    } else {
        let known = KnownHosts::load(&host.known_hosts)?;
        if known.is_empty() {
            warn!(
                "{} has no entries; every host key will be rejected",
                known.path().display()
            );
        } else {
            debug!(
                "Verifying host keys against {} ({} entries)",
                known.path().display(),
                known.len()
            );
        }
        HostVerification::KnownHosts(Arc::new(known))
    };

    Ok(TransportConfig {
        principal: host.user.clone(),
        credential: Arc::new(credential),
        host_verification,
        dial_timeout: timeout,
    })
}

/// 加载私钥文件（OpenSSH / PEM，RSA、Ed25519、ECDSA）
async fn load_private_key(key_path: &Path) -> Result<PrivateKey> {
    debug!("Loading private key from {:?}", key_path);

    let key_data = tokio::fs::read(key_path)
        .await
        .map_err(|e| TunnelError::KeyUnavailable {
            path: key_path.to_path_buf(),
            source: e,
        })?;

    let key = russh::keys::decode_secret_key(&String::from_utf8_lossy(&key_data), None).map_err(
        |e| TunnelError::KeyInvalid {
            path: key_path.to_path_buf(),
            reason: e.to_string(),
        },
    )?;

    debug!(
        "Private key loaded: {} {}",
        key.algorithm().as_str(),
        key.public_key().fingerprint(HashAlg::Sha256)
    );
    Ok(key)
}
