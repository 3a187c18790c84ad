// 默认值常量

use std::time::Duration;

/// 远程 Podman socket 路径（uid 1000 的 rootless 实例）
pub const DEFAULT_REMOTE_SOCKET: &str = "/run/user/1000/podman/podman.sock";

/// SSH 连接超时
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// SSH 默认端口
pub const DEFAULT_SSH_PORT: u16 = 22;

/// HTTP Host 头占位值（实际走 Unix socket）
pub const PLACEHOLDER_HOST: &str = "localhost";

pub const USER_AGENT: &str = concat!("podtunnel/", env!("CARGO_PKG_VERSION"));

/// ~/.ssh 下的文件名
pub mod ssh_files {
    pub const DIR: &str = ".ssh";
    pub const CONFIG: &str = "config";
    pub const KNOWN_HOSTS: &str = "known_hosts";
    pub const DEFAULT_IDENTITY: &str = "id_ed25519";
}
