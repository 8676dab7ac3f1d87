use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::cache::NetworkCache;
use crate::network::NetworkRecord;

type PropertyListener = Box<dyn Fn(&str)>;

/// 主窗口视图模型：只读转发缓存数据，并在网络更新时发出属性变更通知
pub struct MainViewModel {
    cache: Arc<NetworkCache>,
    revision: u64,
    listeners: Vec<PropertyListener>,
}

impl MainViewModel {
    pub const NETWORKS: &'static str = "networks";

    pub fn new(cache: Arc<NetworkCache>) -> Self {
        Self {
            cache,
            revision: 0,
            listeners: Vec::new(),
        }
    }

    pub fn title(&self) -> &'static str {
        "Zerotier GUI"
    }

    pub fn subtitle(&self) -> &'static str {
        "Mint-first tray shell for managing virtual networks."
    }

    pub fn networks(&self) -> Arc<[NetworkRecord]> {
        self.cache.networks()
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.cache.last_refreshed()
    }

    /// 每次网络更新递增，用于判断视图是否需要重建
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn on_property_changed(&mut self, listener: impl Fn(&str) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn notify_networks_updated(&mut self) {
        self.revision += 1;
        for listener in &self.listeners {
            listener(Self::NETWORKS);
        }
    }
}
