// 错误类型定义
// 每个变体对应流水线中的一个失败阶段，Display 输出即为用户可见的单行诊断

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 隧道调用错误
#[derive(Debug, Error)]
pub enum TunnelError {
    /// 命令行参数错误
    #[error("usage error: {0}")]
    Usage(String),

    /// 注册表中不存在该命令
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// SSH 配置文件无法打开
    #[error("ssh config unavailable ({}): {source}", path.display())]
    ConfigUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SSH 配置内容非法
    #[error("invalid ssh config: {directive} value {value:?} for host {host:?}: {reason}")]
    InvalidConfig {
        host: String,
        directive: String,
        value: String,
        reason: String,
    },

    /// 私钥文件读取失败
    #[error("identity file unavailable ({}): {source}", path.display())]
    KeyUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 私钥无法解析
    #[error("identity file invalid ({}): {reason}", path.display())]
    KeyInvalid { path: PathBuf, reason: String },

    /// known_hosts 无法读取或格式错误
    #[error("known_hosts invalid ({}): {reason}", path.display())]
    KnownHostsInvalid { path: PathBuf, reason: String },

    /// TCP 连接失败
    #[error("dial {addr} failed: {reason}")]
    DialFailed { addr: String, reason: String },

    /// SSH 握手或认证失败
    #[error("ssh handshake failed: {0}")]
    HandshakeFailed(String),

    /// 服务器主机密钥校验失败
    #[error("host key verification failed for {host}: {reason}")]
    HostKeyMismatch { host: String, reason: String },

    /// 超时
    #[error("{stage} timed out after {}s", elapsed.as_secs_f64())]
    Timeout {
        stage: &'static str,
        elapsed: Duration,
    },

    /// 远程 Unix socket 转发失败
    #[error("remote socket {path} unavailable: {reason}")]
    SocketUnavailable { path: String, reason: String },

    /// 请求写入失败
    #[error("write request: {0}")]
    RequestWriteFailed(#[source] std::io::Error),

    /// 响应头解析失败
    #[error("parse response: {0}")]
    ResponseParseFailed(String),

    /// 响应体读取失败（状态行已收到）
    #[error("read body (status {status}): {reason}")]
    ResponseBodyReadFailed { status: String, reason: String },
}

impl TunnelError {
    /// 错误所属阶段（用于结构化日志）
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Usage(_) | Self::InvalidCommand(_) => "command",
            Self::ConfigUnavailable { .. } | Self::InvalidConfig { .. } => "config",
            Self::KeyUnavailable { .. } | Self::KeyInvalid { .. } | Self::KnownHostsInvalid { .. } => {
                "auth"
            }
            Self::Timeout { stage: "request", .. } => "api",
            Self::DialFailed { .. }
            | Self::HandshakeFailed(_)
            | Self::HostKeyMismatch { .. }
            | Self::Timeout { .. } => "connect",
            Self::SocketUnavailable { .. } => "tunnel",
            Self::RequestWriteFailed(_)
            | Self::ResponseParseFailed(_)
            | Self::ResponseBodyReadFailed { .. } => "api",
        }
    }

    /// 失败前已收到的 HTTP 状态行
    pub fn received_status(&self) -> Option<&str> {
        match self {
            Self::ResponseBodyReadFailed { status, .. } => Some(status),
            _ => None,
        }
    }
}

impl From<russh::Error> for TunnelError {
    fn from(e: russh::Error) -> Self {
        TunnelError::HandshakeFailed(e.to_string())
    }
}

pub type Result<T, E = TunnelError> = std::result::Result<T, E>;
