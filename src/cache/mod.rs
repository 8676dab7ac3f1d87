use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::network::{self, NetworkRecord, NetworkTool, RouteFlag};

/// 某一时刻的网络列表，整体替换，从不原地修改
#[derive(Debug)]
struct Snapshot {
    networks: Arc<[NetworkRecord]>,
    /// `None` 表示从未刷新过
    refreshed_at: Option<DateTime<Utc>>,
    /// 产生该快照的刷新序号，0 为初始数据
    seq: u64,
}

type Listener = Arc<dyn Fn() + Send + Sync>;

/// 网络缓存
pub struct NetworkCache {
    snapshot: watch::Sender<Snapshot>,
    listeners: Mutex<Vec<Listener>>,
    tool: Option<Arc<dyn NetworkTool>>,
    next_seq: AtomicU64,
}

impl Default for NetworkCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkCache {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Snapshot {
            networks: network::seed_networks().into(),
            refreshed_at: None,
            seq: 0,
        });
        Self {
            snapshot,
            listeners: Mutex::new(Vec::new()),
            tool: None,
            next_seq: AtomicU64::new(1),
        }
    }

    pub fn with_tool(tool: Arc<dyn NetworkTool>) -> Self {
        Self {
            tool: Some(tool),
            ..Self::new()
        }
    }

    pub fn has_tool(&self) -> bool {
        self.tool.is_some()
    }

    pub fn networks(&self) -> Arc<[NetworkRecord]> {
        Arc::clone(&self.snapshot.borrow().networks)
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.snapshot.borrow().refreshed_at
    }

    pub fn find(&self, network_id: &str) -> Option<NetworkRecord> {
        self.snapshot
            .borrow()
            .networks
            .iter()
            .find(|n| n.id == network_id)
            .cloned()
    }

    /// 注册更新监听器，每次成功刷新后调用一次
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// 刷新网络列表
    ///
    /// 没有接入外部工具时只更新时间戳。取消时既不修改列表也不发出通知；
    /// 工具失败时保留旧列表。多个刷新重叠时以后发起的为准，
    /// 先发起但后完成的结果直接丢弃。
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);

        let networks = match &self.tool {
            None => self.networks(),
            Some(tool) => {
                let listed = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    result = tool.list_networks() => result?,
                };
                dedup_by_id(listed).into()
            }
        };

        let swapped = self.snapshot.send_if_modified(|current| {
            if seq <= current.seq {
                return false;
            }
            *current = Snapshot {
                networks,
                refreshed_at: Some(Utc::now()),
                seq,
            };
            true
        });
        if swapped {
            self.notify();
        } else {
            tracing::debug!(seq, "stale refresh result discarded");
        }
        Ok(())
    }

    /// 通过外部工具设置单个开关，成功后刷新
    pub async fn set_flag(
        &self,
        network_id: &str,
        flag: RouteFlag,
        value: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let tool = self.tool.as_ref().ok_or(Error::NoTool)?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = tool.set_flag(network_id, flag, value) => result?,
        }
        tracing::info!(network = network_id, flag = %flag, value, "flag applied");

        self.refresh(cancel).await
    }

    fn notify(&self) {
        // 复制一份再调用，监听器内部可以再次订阅
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener();
        }
    }
}

fn dedup_by_id(networks: Vec<NetworkRecord>) -> Vec<NetworkRecord> {
    let mut seen = HashSet::new();
    networks
        .into_iter()
        .filter(|network| {
            let fresh = seen.insert(network.id.clone());
            if !fresh {
                tracing::warn!(network = %network.id, "duplicate network id dropped");
            }
            fresh
        })
        .collect()
}
