pub mod menu;

use tray_icon::menu::{CheckMenuItem, IsMenuItem, Menu, MenuEvent, MenuItem, PredefinedMenuItem, Submenu};
use tray_icon::{Icon, MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::shell::{UiEvent, UiPoster};
use menu::{MenuEntry, TrayMenu};

const ICON_SIZE: u32 = 32;

/// 把托盘事件转发到 UI 队列
///
/// 退出在这里就先取消后台任务，不依赖界面下一帧才处理。
pub fn forward_events(poster: UiPoster, cancel: CancellationToken) {
    let menu_poster = poster.clone();
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        route_menu_event(event.id.0, &menu_poster, &cancel);
    }));

    TrayIconEvent::set_event_handler(Some(move |event: TrayIconEvent| {
        if let TrayIconEvent::Click {
            button: MouseButton::Left,
            button_state: MouseButtonState::Up,
            ..
        } = event
        {
            poster.post(UiEvent::TrayClicked);
        }
    }));
}

fn route_menu_event(id: String, poster: &UiPoster, cancel: &CancellationToken) {
    tracing::trace!(%id, "menu event");
    if id == menu::QUIT_ID {
        cancel.cancel();
    }
    poster.post(UiEvent::Menu(id));
}

fn build_item(entry: &MenuEntry) -> Result<Box<dyn IsMenuItem>> {
    let item: Box<dyn IsMenuItem> = match entry {
        MenuEntry::Action { id, label } => Box::new(MenuItem::with_id(id.as_str(), label, true, None)),
        MenuEntry::Info { label } => Box::new(MenuItem::new(label, false, None)),
        MenuEntry::Check { id, label, checked } => {
            Box::new(CheckMenuItem::with_id(id.as_str(), label, true, *checked, None))
        }
        MenuEntry::Separator => Box::new(PredefinedMenuItem::separator()),
        MenuEntry::Submenu { id, label, items } => {
            let submenu = Submenu::with_id(id.as_str(), label, true);
            for child in items {
                submenu.append(build_item(child)?.as_ref())?;
            }
            Box::new(submenu)
        }
    };
    Ok(item)
}

fn render(model: &TrayMenu) -> Result<Menu> {
    let menu = Menu::new();
    for entry in &model.items {
        menu.append(build_item(entry)?.as_ref())?;
    }
    Ok(menu)
}

/// 生成托盘图标：一个圆点
fn icon() -> Result<Icon> {
    let center = (ICON_SIZE as f32 - 1.0) / 2.0;
    let radius = ICON_SIZE as f32 / 2.0 - 2.0;
    let mut rgba = Vec::with_capacity((ICON_SIZE * ICON_SIZE * 4) as usize);
    for y in 0..ICON_SIZE {
        for x in 0..ICON_SIZE {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let alpha = if dx * dx + dy * dy <= radius * radius { 255 } else { 0 };
            rgba.extend_from_slice(&[0xff, 0xb4, 0x41, alpha]);
        }
    }
    Ok(Icon::from_rgba(rgba, ICON_SIZE, ICON_SIZE)?)
}

fn build_tray(initial: &TrayMenu) -> Result<TrayIcon> {
    let tray = TrayIconBuilder::new()
        .with_menu(Box::new(render(initial)?))
        .with_menu_on_left_click(false)
        .with_tooltip("Zerotier GUI")
        .with_icon(icon()?)
        .build()?;
    Ok(tray)
}

fn apply_menu(tray: &TrayIcon, model: &TrayMenu) {
    match render(model) {
        Ok(menu) => tray.set_menu(Some(Box::new(menu))),
        Err(e) => tracing::warn!(error = %e, "failed to rebuild tray menu"),
    }
}

#[cfg(not(target_os = "linux"))]
pub use native::TrayHost;

#[cfg(target_os = "linux")]
pub use gtk_thread::TrayHost;

#[cfg(not(target_os = "linux"))]
mod native {
    use super::*;

    /// 托盘图标，直接存放在 UI 线程上
    pub struct TrayHost {
        tray: Option<TrayIcon>,
    }

    impl TrayHost {
        pub fn spawn(initial: &TrayMenu) -> Result<Self> {
            Ok(Self {
                tray: Some(build_tray(initial)?),
            })
        }

        pub fn set_menu(&self, model: &TrayMenu) {
            if let Some(tray) = &self.tray {
                apply_menu(tray, model);
            }
        }

        pub fn shutdown(&mut self) {
            self.tray.take();
        }
    }
}

#[cfg(target_os = "linux")]
mod gtk_thread {
    use super::*;
    use crate::error::Error;
    use gtk::glib::ControlFlow;
    use std::sync::mpsc::{self, TryRecvError};
    use std::thread;
    use std::time::Duration;

    enum TrayCommand {
        SetMenu(TrayMenu),
        Shutdown,
    }

    /// Linux 上托盘依赖 GTK 主循环，图标放在单独的线程里，通过命令通道更新
    pub struct TrayHost {
        commands: mpsc::Sender<TrayCommand>,
        thread: Option<thread::JoinHandle<()>>,
    }

    impl TrayHost {
        pub fn spawn(initial: &TrayMenu) -> Result<Self> {
            let (commands, rx) = mpsc::channel();
            let (ready_tx, ready_rx) = mpsc::channel();
            let initial = initial.clone();

            let thread = thread::Builder::new()
                .name("tray".into())
                .spawn(move || {
                    if let Err(e) = gtk::init() {
                        let _ = ready_tx.send(Err(Error::Tray(e.to_string())));
                        return;
                    }
                    let tray = match build_tray(&initial) {
                        Ok(tray) => tray,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));

                    gtk::glib::timeout_add_local(Duration::from_millis(100), move || loop {
                        match rx.try_recv() {
                            Ok(TrayCommand::SetMenu(model)) => apply_menu(&tray, &model),
                            Err(TryRecvError::Empty) => return ControlFlow::Continue,
                            Ok(TrayCommand::Shutdown) | Err(TryRecvError::Disconnected) => {
                                gtk::main_quit();
                                return ControlFlow::Break;
                            }
                        }
                    });
                    gtk::main();
                    tracing::debug!("tray thread finished");
                })?;

            ready_rx
                .recv()
                .map_err(|_| Error::Tray("tray thread exited during startup".into()))??;

            Ok(Self {
                commands,
                thread: Some(thread),
            })
        }

        pub fn set_menu(&self, model: &TrayMenu) {
            let _ = self.commands.send(TrayCommand::SetMenu(model.clone()));
        }

        pub fn shutdown(&mut self) {
            let _ = self.commands.send(TrayCommand::Shutdown);
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::shell::{Effect, Shell};

    fn hidden_shell() -> Shell {
        let config = AppConfig {
            start_hidden: true,
            ..AppConfig::default()
        };
        Shell::start(&config, None, tokio::runtime::Handle::current(), || {})
    }

    #[tokio::test(start_paused = true)]
    async fn quit_click_cancels_before_ui_runs() {
        let mut shell = hidden_shell();
        let cancel = shell.cancel_token();

        route_menu_event(menu::QUIT_ID.to_string(), &shell.poster(), &cancel);

        // 界面还没处理队列，后台任务已经停止
        assert!(cancel.is_cancelled());
        assert!(!shell.is_quitting());
        assert_eq!(shell.pump(), vec![Effect::Shutdown]);
        assert!(shell.is_quitting());
    }

    #[tokio::test(start_paused = true)]
    async fn other_clicks_only_post() {
        let mut shell = hidden_shell();
        let cancel = shell.cancel_token();

        route_menu_event(menu::OPEN_ID.to_string(), &shell.poster(), &cancel);
        route_menu_event("toggle:allowGlobal:c3po1ab123000abc".to_string(), &shell.poster(), &cancel);

        assert!(!cancel.is_cancelled());
        let effects = shell.pump();
        assert_eq!(effects[0], Effect::ShowWindow);
        assert!(matches!(effects[1], Effect::UpdateTray(_)));
    }
}
