// 主机解析：别名 -> HostConfig
// 只读取一次配置文件，不做任何网络 I/O

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::config::HostConfig;
use super::ssh_config::SshConfigFile;
use crate::constants::{ssh_files, DEFAULT_SSH_PORT};
use crate::error::{Result, TunnelError};

/// SSH 相关文件路径
#[derive(Clone, Debug)]
pub struct SshPaths {
    /// 用户主目录（~ 展开的基准）
    pub home: PathBuf,
    /// ~/.ssh/config
    pub config: PathBuf,
    /// ~/.ssh/known_hosts
    pub known_hosts: PathBuf,
}

impl SshPaths {
    /// 以指定目录为 HOME 的约定路径
    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let ssh_dir = home.join(ssh_files::DIR);
        Self {
            config: ssh_dir.join(ssh_files::CONFIG),
            known_hosts: ssh_dir.join(ssh_files::KNOWN_HOSTS),
            home,
        }
    }

    /// 当前用户的约定路径
    pub fn discover() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| TunnelError::ConfigUnavailable {
            path: PathBuf::from("~"),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "home directory could not be determined",
            ),
        })?;
        Ok(Self::from_home(home))
    }

    /// 展开 ~/ 前缀
    fn expand_tilde(&self, value: &str) -> PathBuf {
        match value.strip_prefix("~/") {
            Some(rest) => self.home.join(rest),
            None => PathBuf::from(value),
        }
    }
}

/// 主机解析器
#[derive(Clone, Debug)]
pub struct HostResolver {
    paths: SshPaths,
    /// 未配置 User 时使用的本地用户名
    local_user: String,
}

impl HostResolver {
    pub fn new(paths: SshPaths, local_user: impl Into<String>) -> Self {
        Self {
            paths,
            local_user: local_user.into(),
        }
    }

    /// 解析主机别名
    ///
    /// 每个字段都有默认值：HostName 默认为别名本身，Port 默认 22，
    /// User 默认为本地用户，IdentityFile 默认 ~/.ssh/id_ed25519。
    pub fn resolve(&self, alias: &str) -> Result<HostConfig> {
        if alias.trim().is_empty() {
            return Err(TunnelError::Usage("host alias must not be empty".into()));
        }

        let content =
            fs::read_to_string(&self.paths.config).map_err(|e| TunnelError::ConfigUnavailable {
                path: self.paths.config.clone(),
                source: e,
            })?;

        let config = SshConfigFile::parse(&content).map_err(|e| TunnelError::InvalidConfig {
            host: alias.to_string(),
            directive: e.keyword.clone(),
            value: e.value.clone(),
            reason: e.to_string(),
        })?;

        if !config.has_host(alias) {
            debug!("No Host block matches {:?}; using defaults", alias);
        }

        let lookup = |keyword: &str| config.get(alias, keyword).filter(|v| !v.is_empty());

        let host_name = lookup("HostName").unwrap_or(alias).to_string();

        let user = lookup("User")
            .map(str::to_string)
            .unwrap_or_else(|| self.local_user.clone());

        let identity_file = match lookup("IdentityFile") {
            Some(value) => self.paths.expand_tilde(value),
            None => self
                .paths
                .home
                .join(ssh_files::DIR)
                .join(ssh_files::DEFAULT_IDENTITY),
        };

        let port = match lookup("Port") {
            Some(value) => parse_port(alias, value)?,
            None => DEFAULT_SSH_PORT,
        };

        let resolved = HostConfig {
            alias: alias.to_string(),
            host_name,
            port,
            user,
            identity_file,
            known_hosts: self.paths.known_hosts.clone(),
        };

        debug!(
            "Resolved {}: {}@{}:{} (identity {:?})",
            alias, resolved.user, resolved.host_name, resolved.port, resolved.identity_file
        );

        Ok(resolved)
    }
}

fn parse_port(alias: &str, value: &str) -> Result<u16> {
    value.parse::<u16>().map_err(|e| TunnelError::InvalidConfig {
        host: alias.to_string(),
        directive: "Port".to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
