use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::cache::NetworkCache;

/// 后台刷新循环的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Refreshing,
    Cancelled,
}

/// 周期性刷新网络缓存，直到 `cancel` 被触发
///
/// 刷新失败只记录日志，循环继续；取消在刷新中或等待中都会立即结束循环。
pub async fn run(
    cache: Arc<NetworkCache>,
    interval: Duration,
    cancel: CancellationToken,
    state: watch::Sender<LoopState>,
) {
    tracing::debug!(?interval, "refresh loop started");

    loop {
        state.send_replace(LoopState::Refreshing);
        match cache.refresh(&cancel).await {
            Ok(()) => tracing::trace!("networks refreshed"),
            Err(e) if e.is_cancelled() => break,
            Err(e) => tracing::warn!(error = %e, "network refresh failed"),
        }
        state.send_replace(LoopState::Idle);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    state.send_replace(LoopState::Cancelled);
    tracing::debug!("refresh loop stopped");
}

/// 在给定运行时上启动刷新循环，返回状态接收端
pub fn spawn(
    runtime: &tokio::runtime::Handle,
    cache: Arc<NetworkCache>,
    interval: Duration,
    cancel: CancellationToken,
) -> (tokio::task::JoinHandle<()>, watch::Receiver<LoopState>) {
    let (state_tx, state_rx) = watch::channel(LoopState::Idle);
    let handle = runtime.spawn(run(cache, interval, cancel, state_tx));
    (handle, state_rx)
}
