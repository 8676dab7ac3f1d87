use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::NetworkCache;
use crate::config::AppConfig;
use crate::network::{NetworkTool, RouteFlag};
use crate::refresh::{self, LoopState};
use crate::tray::menu::{self, MenuAction, TrayMenu};
use crate::viewmodel::MainViewModel;

/// 退出时等待后台刷新循环结束的最长时间
const LOOP_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// 从后台线程投递到 UI 线程的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    NetworksUpdated,
    Menu(String),
    TrayClicked,
}

/// UI 线程需要执行的副作用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    UpdateTray(TrayMenu),
    ShowWindow,
    HideWindow,
    Shutdown,
}

/// 线程安全的投递句柄：事件进入单消费者队列，然后唤醒 UI 循环
#[derive(Clone)]
pub struct UiPoster {
    tx: mpsc::Sender<UiEvent>,
    wake: Arc<dyn Fn() + Send + Sync>,
}

impl UiPoster {
    pub fn post(&self, event: UiEvent) {
        if self.tx.send(event).is_ok() {
            (self.wake)();
        } else {
            tracing::trace!("ui queue closed, event dropped");
        }
    }
}

/// 主窗口状态（窗口本身由界面层绘制）
#[derive(Debug, Default)]
pub struct MainWindow {
    visible: bool,
}

impl MainWindow {
    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

/// 托盘外壳控制器，只在 UI 线程上使用
pub struct Shell {
    cache: Arc<NetworkCache>,
    view_model: MainViewModel,
    events: mpsc::Receiver<UiEvent>,
    poster: UiPoster,
    runtime: Handle,
    cancel: CancellationToken,
    loop_state: watch::Receiver<LoopState>,
    refresh_task: Option<JoinHandle<()>>,
    tray_menu: TrayMenu,
    window: Option<MainWindow>,
    effects: Vec<Effect>,
    quitting: bool,
}

impl Shell {
    /// 创建缓存和视图模型，并在 `runtime` 上启动后台刷新
    pub fn start(
        config: &AppConfig,
        tool: Option<Arc<dyn NetworkTool>>,
        runtime: Handle,
        wake: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let cache = Arc::new(match tool {
            Some(tool) => NetworkCache::with_tool(tool),
            None => NetworkCache::new(),
        });

        let (tx, events) = mpsc::channel();
        let poster = UiPoster {
            tx,
            wake: Arc::new(wake),
        };
        {
            let poster = poster.clone();
            cache.subscribe(move || poster.post(UiEvent::NetworksUpdated));
        }

        let view_model = MainViewModel::new(Arc::clone(&cache));
        let cancel = CancellationToken::new();
        let (refresh_task, loop_state) = refresh::spawn(
            &runtime,
            Arc::clone(&cache),
            config.refresh_interval(),
            cancel.clone(),
        );

        let tray_menu = menu::build(&cache.networks());
        let mut shell = Self {
            cache,
            view_model,
            events,
            poster,
            runtime,
            cancel,
            loop_state,
            refresh_task: Some(refresh_task),
            tray_menu,
            window: None,
            effects: Vec::new(),
            quitting: false,
        };
        if !config.start_hidden {
            shell.open_window();
        }

        tracing::info!(
            interval_secs = config.refresh_interval_secs,
            tool = shell.cache.has_tool(),
            "shell started"
        );
        shell
    }

    pub fn poster(&self) -> UiPoster {
        self.poster.clone()
    }

    pub fn view_model(&self) -> &MainViewModel {
        &self.view_model
    }

    pub fn view_model_mut(&mut self) -> &mut MainViewModel {
        &mut self.view_model
    }

    pub fn tray_menu(&self) -> &TrayMenu {
        &self.tray_menu
    }

    pub fn window(&self) -> Option<&MainWindow> {
        self.window.as_ref()
    }

    pub fn loop_state(&self) -> LoopState {
        *self.loop_state.borrow()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    /// 按投递顺序处理队列中的事件，返回需要执行的副作用
    pub fn pump(&mut self) -> Vec<Effect> {
        while let Ok(event) = self.events.try_recv() {
            self.handle(event);
        }
        std::mem::take(&mut self.effects)
    }

    fn handle(&mut self, event: UiEvent) {
        match event {
            UiEvent::NetworksUpdated => self.on_networks_updated(),
            UiEvent::TrayClicked => self.open_window(),
            UiEvent::Menu(id) => match MenuAction::parse(&id) {
                Some(action) => self.dispatch(action),
                None => tracing::trace!(%id, "menu item without action"),
            },
        }
    }

    pub fn dispatch(&mut self, action: MenuAction) {
        match action {
            MenuAction::Open => self.open_window(),
            MenuAction::Quit => self.quit(),
            MenuAction::Toggle { flag, network_id } => self.toggle(flag, &network_id),
        }
    }

    fn on_networks_updated(&mut self) {
        self.view_model.notify_networks_updated();
        self.tray_menu = menu::build(&self.cache.networks());
        self.effects.push(Effect::UpdateTray(self.tray_menu.clone()));
    }

    /// 显示主窗口；窗口不存在时先创建
    pub fn open_window(&mut self) {
        let window = self.window.get_or_insert_with(|| {
            tracing::debug!("creating main window");
            MainWindow::default()
        });
        window.visible = true;
        self.effects.push(Effect::ShowWindow);
    }

    /// 关闭窗口时只隐藏到托盘
    pub fn hide_window(&mut self) {
        if let Some(window) = self.window.as_mut() {
            window.visible = false;
            self.effects.push(Effect::HideWindow);
        }
    }

    /// 切换某个网络的开关
    ///
    /// 没有外部工具时只记录请求；有工具时在后台设置并刷新，失败只记日志。
    pub fn toggle(&mut self, flag: RouteFlag, network_id: &str) {
        let Some(network) = self.cache.find(network_id) else {
            tracing::warn!(flag = flag.key(), network = network_id, "toggle for unknown network");
            self.effects.push(Effect::UpdateTray(self.tray_menu.clone()));
            return;
        };
        let value = !network.flag(flag);

        if self.cache.has_tool() {
            let cache = Arc::clone(&self.cache);
            let cancel = self.cancel.clone();
            let id = network.id.clone();
            self.runtime.spawn(async move {
                match cache.set_flag(&id, flag, value, &cancel).await {
                    Ok(()) => {}
                    Err(e) if e.is_cancelled() => tracing::debug!(network = %id, "toggle cancelled"),
                    Err(e) => tracing::warn!(flag = flag.key(), network = %id, error = %e, "toggle failed"),
                }
            });
        } else {
            tracing::info!(flag = flag.key(), network = %network.id, "toggle requested");
        }

        // 原生菜单点击后会自行改变勾选状态，这里按实际数据重新同步
        self.effects.push(Effect::UpdateTray(self.tray_menu.clone()));
    }

    /// 立即刷新一次（窗口中的刷新按钮）
    pub fn request_refresh(&self) {
        let cache = Arc::clone(&self.cache);
        let cancel = self.cancel.clone();
        self.runtime.spawn(async move {
            match cache.refresh(&cancel).await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::warn!(error = %e, "manual refresh failed"),
            }
        });
    }

    /// 先停止后台刷新，再请求退出
    pub fn quit(&mut self) {
        if self.quitting {
            return;
        }
        tracing::info!("quit requested");
        self.cancel.cancel();
        self.quitting = true;
        if let Some(task) = self.refresh_task.take() {
            self.runtime.spawn(join_refresh_loop(task));
        }
        self.effects.push(Effect::Shutdown);
    }
}

/// 等待已取消的刷新循环退出，超时则强制中止
async fn join_refresh_loop(task: JoinHandle<()>) {
    let abort = task.abort_handle();
    match tokio::time::timeout(LOOP_STOP_TIMEOUT, task).await {
        Ok(Ok(())) => tracing::debug!("refresh loop joined"),
        Ok(Err(e)) => tracing::warn!(error = %e, "refresh loop ended abnormally"),
        Err(_) => {
            tracing::warn!("refresh loop did not stop in time, aborting");
            abort.abort();
        }
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }
}
