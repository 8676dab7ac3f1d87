use async_trait::async_trait;
use std::fmt;

use crate::error::Result;

/// 网络连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
    PortError,
}

impl NetworkStatus {
    pub fn label(self) -> &'static str {
        match self {
            NetworkStatus::Online => "Online",
            NetworkStatus::Offline => "Offline",
            NetworkStatus::PortError => "Port error",
        }
    }
}

/// 单个网络的路由/DNS 权限开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteFlag {
    AllowDefault,
    AllowManaged,
    AllowGlobal,
}

impl RouteFlag {
    pub const ALL: [RouteFlag; 3] = [
        RouteFlag::AllowDefault,
        RouteFlag::AllowManaged,
        RouteFlag::AllowGlobal,
    ];

    /// 稳定的键名，用于菜单 ID 和外部工具
    pub fn key(self) -> &'static str {
        match self {
            RouteFlag::AllowDefault => "allowDefault",
            RouteFlag::AllowManaged => "allowManaged",
            RouteFlag::AllowGlobal => "allowGlobal",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.key() == key)
    }

    pub fn label(self) -> &'static str {
        match self {
            RouteFlag::AllowDefault => "Allow default route",
            RouteFlag::AllowManaged => "Allow managed routes/DNS",
            RouteFlag::AllowGlobal => "Allow global IPv6",
        }
    }
}

impl fmt::Display for RouteFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// 一个受管理的虚拟网络
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRecord {
    pub name: String,
    /// 网络 ID，在列表中唯一
    pub id: String,
    pub status: NetworkStatus,
    pub allow_default: bool,
    pub allow_managed: bool,
    pub allow_global: bool,
}

impl NetworkRecord {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        status: NetworkStatus,
        allow_default: bool,
        allow_managed: bool,
        allow_global: bool,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            status,
            allow_default,
            allow_managed,
            allow_global,
        }
    }

    /// 菜单显示名称
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.id)
    }

    pub fn status_label(&self) -> &'static str {
        self.status.label()
    }

    pub fn flag(&self, flag: RouteFlag) -> bool {
        match flag {
            RouteFlag::AllowDefault => self.allow_default,
            RouteFlag::AllowManaged => self.allow_managed,
            RouteFlag::AllowGlobal => self.allow_global,
        }
    }
}

/// 启动时的初始网络列表（在接入外部工具之前使用）
pub fn seed_networks() -> Vec<NetworkRecord> {
    vec![
        NetworkRecord::new("Home LAN", "8056c2e21c000001", NetworkStatus::Online, true, true, false),
        NetworkRecord::new("Lab", "c3po1ab123000abc", NetworkStatus::Online, false, true, true),
        NetworkRecord::new("Guest", "faded12345000002", NetworkStatus::Offline, false, false, false),
    ]
}

/// 外部网络管理工具
///
/// 刷新时列出网络，切换开关时设置单个标志。具体的命令行调用方式由实现决定。
#[async_trait]
pub trait NetworkTool: Send + Sync {
    async fn list_networks(&self) -> Result<Vec<NetworkRecord>>;

    async fn set_flag(&self, network_id: &str, flag: RouteFlag, value: bool) -> Result<()>;
}
