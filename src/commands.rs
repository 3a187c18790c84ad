// 命令注册表
// 短命令名 -> HTTP 方法 + API 路径；流水线只依赖 CommandRegistry trait，可注入替换

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

/// 待执行的远程 API 调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub method: String,
    pub path: String,
}

impl RemoteCommand {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }
}

/// 命令查找能力
pub trait CommandRegistry: Send + Sync {
    /// 精确匹配命令名
    fn lookup(&self, name: &str) -> Option<RemoteCommand>;

    /// 全部条目（按名称排序），返回副本
    fn entries(&self) -> Vec<(String, RemoteCommand)>;
}

/// 内置命令表
static BUILTIN_COMMANDS: Lazy<BTreeMap<&'static str, (&'static str, &'static str)>> =
    Lazy::new(|| {
        let mut table = BTreeMap::new();
        table.insert("list_containers", ("GET", "/v3.0.0/containers/json"));
        table
    });

/// 编译期固定的内置注册表
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRegistry;

impl CommandRegistry for StaticRegistry {
    fn lookup(&self, name: &str) -> Option<RemoteCommand> {
        BUILTIN_COMMANDS
            .get(name)
            .map(|(method, path)| RemoteCommand::new(*method, *path))
    }

    fn entries(&self) -> Vec<(String, RemoteCommand)> {
        BUILTIN_COMMANDS
            .iter()
            .map(|(name, (method, path))| (name.to_string(), RemoteCommand::new(*method, *path)))
            .collect()
    }
}
