// 命令行参数解析（clap derive）

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::constants::DEFAULT_REMOTE_SOCKET;
use crate::error::{Result, TunnelError};
use crate::runner::RunConfig;

/// Call the Podman API on a remote host through an SSH-forwarded Unix socket.
#[derive(Parser, Debug, Clone)]
#[command(name = "podtunnel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Host alias from ~/.ssh/config (or a plain hostname).
    #[arg(long, required_unless_present = "list_commands")]
    pub host: Option<String>,

    /// Connection timeout (e.g. 30s, 500ms, 1m30s; bare numbers are seconds).
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub timeout: Duration,

    /// Request/response timeout; defaults to --timeout.
    #[arg(long, value_parser = parse_duration)]
    pub request_timeout: Option<Duration>,

    /// Accept any host key (insecure, for diagnostics only).
    #[arg(long)]
    pub no_host_validation: bool,

    /// Remote Podman API socket.
    #[arg(long, default_value = DEFAULT_REMOTE_SOCKET)]
    pub socket: String,

    /// SSH config file to read instead of ~/.ssh/config.
    #[arg(long, value_name = "PATH")]
    pub ssh_config: Option<PathBuf>,

    /// known_hosts file to read instead of ~/.ssh/known_hosts.
    #[arg(long, value_name = "PATH")]
    pub known_hosts: Option<PathBuf>,

    /// Pretty-print JSON response bodies.
    #[arg(long)]
    pub pretty: bool,

    /// Enable debug logging on stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// List the available commands and exit.
    #[arg(long)]
    pub list_commands: bool,

    /// Command to run (see --list-commands).
    #[arg(required_unless_present = "list_commands")]
    pub command: Option<String>,
}

impl Cli {
    /// 转换为 RunConfig
    pub fn into_run_config(self) -> Result<RunConfig> {
        let host = self
            .host
            .ok_or_else(|| TunnelError::Usage("--host is required".into()))?;
        let command = self
            .command
            .ok_or_else(|| TunnelError::Usage("a command name is required".into()))?;

        Ok(RunConfig {
            host,
            command,
            timeout: self.timeout,
            request_timeout: self.request_timeout,
            no_host_validation: self.no_host_validation,
            socket_path: self.socket,
            ssh_config: self.ssh_config,
            known_hosts: self.known_hosts,
            pretty: self.pretty,
        })
    }
}

/// 解析时长：30s / 500ms / 2m / 1h / 1m30s / 纯数字（秒）
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".into());
    }

    if let Ok(secs) = input.parse::<u64>() {
        return non_zero(Duration::from_secs(secs), input);
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!("invalid duration {:?}", input));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid duration {:?}", input))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            unit => return Err(format!("unknown duration unit {:?} in {:?}", unit, input)),
        };
        total = total.saturating_add(part);
        rest = &rest[unit_len..];
    }

    non_zero(total, input)
}

fn non_zero(duration: Duration, input: &str) -> std::result::Result<Duration, String> {
    if duration.is_zero() {
        Err(format!("duration {:?} must be greater than zero", input))
    } else {
        Ok(duration)
    }
}
