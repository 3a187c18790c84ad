//! known_hosts 数据库
//!
//! 构造时完整解析并校验文件（格式错误立即报错），握手时用内存中的条目
//! 校验服务器公钥。哈希主机名（`|1|...`）交给 russh 的 known_hosts 匹配。

use std::fs;
use std::path::{Path, PathBuf};

use russh::keys::{self, PublicKey};
use tracing::debug;

use super::ssh_config::glob_match;
use crate::constants::DEFAULT_SSH_PORT;
use crate::error::{Result, TunnelError};

/// 校验结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyCheck {
    /// 与已存储密钥一致
    Trusted,
    /// 没有该主机的记录
    Unknown,
    /// 主机有记录但密钥不同（可能是中间人攻击）
    Changed { line: usize },
    /// 密钥被 @revoked 标记
    Revoked { line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    CertAuthority,
    Revoked,
}

#[derive(Debug, Clone)]
struct Entry {
    line: usize,
    marker: Option<Marker>,
    /// 明文主机模式（小写）
    patterns: Vec<String>,
    hashed: bool,
    key: PublicKey,
}

impl Entry {
    /// 明文模式匹配（支持通配符与 ! 否定）
    fn matches(&self, name: &str) -> bool {
        let mut matched = false;
        for pattern in &self.patterns {
            match pattern.strip_prefix('!') {
                Some(negated) if glob_match(negated, name) => return false,
                Some(_) => {}
                None if glob_match(pattern, name) => matched = true,
                None => {}
            }
        }
        matched
    }
}

/// 已加载的 known_hosts 文件
#[derive(Debug, Clone)]
pub struct KnownHosts {
    path: PathBuf,
    entries: Vec<Entry>,
}

impl KnownHosts {
    /// 读取并校验 known_hosts
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| TunnelError::KnownHostsInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let entries = parse(&content).map_err(|(line, reason)| TunnelError::KnownHostsInvalid {
            path: path.to_path_buf(),
            reason: format!("line {}: {}", line, reason),
        })?;

        debug!(
            "Loaded {} known host entries from {}",
            entries.len(),
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 校验服务器公钥
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> HostKeyCheck {
        let name = lookup_name(host, port);
        let presented = key.key_data();

        // 吊销优先于一切
        if let Some(revoked) = self
            .entries
            .iter()
            .find(|e| e.marker == Some(Marker::Revoked) && e.key.key_data() == presented)
        {
            return HostKeyCheck::Revoked {
                line: revoked.line,
            };
        }

        let mut changed = None;
        for entry in self
            .entries
            .iter()
            .filter(|e| e.marker.is_none() && e.matches(&name))
        {
            if entry.key.key_data() == presented {
                return HostKeyCheck::Trusted;
            }
            if entry.key.algorithm() == key.algorithm() && changed.is_none() {
                changed = Some(entry.line);
            }
        }
        if let Some(line) = changed {
            return HostKeyCheck::Changed { line };
        }

        if self.entries.iter().any(|e| e.hashed) {
            return match keys::check_known_hosts_path(host, port, key, &self.path) {
                Ok(true) => HostKeyCheck::Trusted,
                Ok(false) => HostKeyCheck::Unknown,
                Err(keys::Error::KeyChanged { line }) => HostKeyCheck::Changed { line },
                Err(e) => {
                    debug!("hashed known_hosts lookup failed: {}", e);
                    HostKeyCheck::Unknown
                }
            };
        }

        HostKeyCheck::Unknown
    }
}

/// known_hosts 中的主机名形式：22 端口直接用主机名，否则 [host]:port
fn lookup_name(host: &str, port: u16) -> String {
    let host = host.to_lowercase();
    if port == DEFAULT_SSH_PORT {
        host
    } else {
        format!("[{}]:{}", host, port)
    }
}

/// 解析全部条目；失败时返回 (行号, 原因)
fn parse(content: &str) -> std::result::Result<Vec<Entry>, (usize, String)> {
    let mut entries = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace().peekable();

        let marker = match fields.peek() {
            Some(&"@cert-authority") => Some(Marker::CertAuthority),
            Some(&"@revoked") => Some(Marker::Revoked),
            Some(m) if m.starts_with('@') => {
                return Err((line_no, format!("unknown marker {}", m)));
            }
            _ => None,
        };
        if marker.is_some() {
            fields.next();
        }

        let (Some(hosts), Some(key_type), Some(blob)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err((line_no, "expected <hosts> <key-type> <base64-key>".to_string()));
        };

        let key = keys::parse_public_key_base64(blob)
            .map_err(|e| (line_no, format!("bad {} key: {}", key_type, e)))?;
        if key.algorithm().as_str() != key_type {
            return Err((
                line_no,
                format!(
                    "key type {} does not match key data ({})",
                    key_type,
                    key.algorithm().as_str()
                ),
            ));
        }

        let mut patterns = Vec::new();
        let mut hashed = false;
        for host in hosts.split(',') {
            if host.starts_with("|1|") {
                hashed = true;
            } else if !host.is_empty() {
                patterns.push(host.to_lowercase());
            }
        }

        entries.push(Entry {
            line: line_no,
            marker,
            patterns,
            hashed,
            key,
        });
    }

    Ok(entries)
}
