// 调用流水线
// 命令查找 -> 主机解析 -> 认证配置 -> 建立隧道 -> API 调用，任一阶段失败立即返回。
// 错误只在 run() 中渲染并映射为退出码。

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info};

use crate::api::{self, InvocationOutcome};
use crate::commands::{CommandRegistry, RemoteCommand, StaticRegistry};
use crate::constants::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REMOTE_SOCKET};
use crate::error::{Result, TunnelError};
use crate::ssh::{build_transport_config, HostConfig, HostResolver, SshClient, SshPaths, TransportConfig};
use crate::tunnel::{Connector, Tunnel};

/// 单次调用的全部参数
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// 主机别名
    pub host: String,
    /// 命令名
    pub command: String,
    /// 拨号 + 握手超时
    pub timeout: Duration,
    /// 请求/响应超时，未设置时与 timeout 相同
    pub request_timeout: Option<Duration>,
    pub no_host_validation: bool,
    /// 远程 Podman socket
    pub socket_path: String,
    /// 覆盖 ~/.ssh/config
    pub ssh_config: Option<PathBuf>,
    /// 覆盖 ~/.ssh/known_hosts
    pub known_hosts: Option<PathBuf>,
    /// 以缩进 JSON 输出 body
    pub pretty: bool,
}

impl RunConfig {
    pub fn new(host: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            command: command.into(),
            timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            no_host_validation: false,
            socket_path: DEFAULT_REMOTE_SOCKET.to_string(),
            ssh_config: None,
            known_hosts: None,
            pretty: false,
        }
    }

    pub fn effective_request_timeout(&self) -> Duration {
        self.request_timeout.unwrap_or(self.timeout)
    }

    /// 应用路径覆盖
    pub fn ssh_paths(&self, mut paths: SshPaths) -> SshPaths {
        if let Some(config) = &self.ssh_config {
            paths.config = config.clone();
        }
        if let Some(known_hosts) = &self.known_hosts {
            paths.known_hosts = known_hosts.clone();
        }
        paths
    }
}

/// 网络阶段之前准备好的全部输入
#[derive(Debug)]
pub struct PreparedRun {
    pub command: RemoteCommand,
    pub host: HostConfig,
    pub transport: TransportConfig,
    pub socket_path: String,
    pub request_timeout: Duration,
}

/// 无网络 I/O 的准备阶段，命令查找最先执行
pub async fn prepare(
    config: &RunConfig,
    registry: &dyn CommandRegistry,
    resolver: &HostResolver,
) -> Result<PreparedRun> {
    let command = registry
        .lookup(&config.command)
        .ok_or_else(|| TunnelError::InvalidCommand(config.command.clone()))?;
    debug!("Command {:?} -> {} {}", config.command, command.method, command.path);

    let host = resolver.resolve(&config.host)?;

    let transport = build_transport_config(config.timeout, config.no_host_validation, &host).await?;
    debug!("Transport ready: {:?}", transport);

    Ok(PreparedRun {
        command,
        host,
        transport,
        socket_path: config.socket_path.clone(),
        request_timeout: config.effective_request_timeout(),
    })
}

/// 网络阶段：建立会话、打开通道、调用 API；通道与会话在所有路径上按逆序关闭
pub async fn execute<C: Connector>(connector: &C, prepared: &PreparedRun) -> Result<InvocationOutcome> {
    let addr = prepared.host.addr();
    let session = connector.connect(&addr, &prepared.transport).await?;
    info!("Session established with {}", addr);

    let result = match session.open_forwarded_socket(&prepared.socket_path).await {
        Ok(mut socket) => {
            info!("Forwarded socket {} opened", prepared.socket_path);
            let outcome = timeout(
                prepared.request_timeout,
                api::invoke(&mut socket, &prepared.command),
            )
            .await
            .unwrap_or_else(|_| {
                Err(TunnelError::Timeout {
                    stage: "request",
                    elapsed: prepared.request_timeout,
                })
            });
            session.close_socket(socket).await;
            outcome
        }
        Err(e) => Err(e),
    };

    session.close().await;
    debug!("Session with {} closed", addr);
    result
}

/// prepare + execute
pub async fn run_with<C: Connector>(
    config: &RunConfig,
    registry: &dyn CommandRegistry,
    resolver: &HostResolver,
    connector: &C,
) -> Result<InvocationOutcome> {
    let prepared = prepare(config, registry, resolver).await?;
    execute(connector, &prepared).await
}

/// 使用当前用户环境、内置注册表与真实 SSH 客户端执行
async fn run_default(config: &RunConfig) -> Result<InvocationOutcome> {
    let paths = config.ssh_paths(SshPaths::discover()?);
    let resolver = HostResolver::new(paths, whoami::username());
    run_with(config, &StaticRegistry, &resolver, &SshClient::new()).await
}

/// 执行并渲染结果，返回进程退出码
pub async fn run(config: RunConfig) -> u8 {
    let result = run_default(&config).await;
    let stdout = io::stdout();
    let stderr = io::stderr();
    report(result, config.pretty, &mut stdout.lock(), &mut stderr.lock())
}

/// 结果渲染：成功写 out，失败写 err；body 读取失败时状态行仍写 out
pub fn report<O: Write, E: Write>(
    result: Result<InvocationOutcome>,
    pretty: bool,
    out: &mut O,
    err: &mut E,
) -> u8 {
    match result {
        Ok(outcome) => {
            if let Err(e) = outcome.render(out, pretty) {
                let _ = writeln!(err, "error: write output: {}", e);
                return 1;
            }
            outcome.exit_code()
        }
        Err(e) => {
            debug!(stage = e.stage(), "Invocation failed");
            if let Some(status) = e.received_status() {
                let _ = writeln!(out, "Status: {}", status);
                let _ = out.flush();
            }
            let _ = writeln!(err, "error: {}", e);
            1
        }
    }
}

/// 列出注册表
pub fn list_commands<W: Write>(registry: &dyn CommandRegistry, out: &mut W) -> io::Result<()> {
    for (name, command) in registry.entries() {
        writeln!(out, "{:<20} {:<7} {}", name, command.method, command.path)?;
    }
    out.flush()
}
