use eframe::egui;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::Result;
use crate::network::{NetworkRecord, NetworkStatus, RouteFlag};
use crate::refresh::LoopState;
use crate::shell::{Effect, MainWindow, Shell};
use crate::tray::{self, TrayHost};
use crate::viewmodel::MainViewModel;

pub struct ZerotierTrayApp {
    shell: Shell,
    tray: Option<TrayHost>,
    config: AppConfig,
    /// 当前绘制的网络列表，视图模型通知后才重新取
    rows: Arc<[NetworkRecord]>,
    rows_dirty: Rc<Cell<bool>>,
    status_message: String,
}

impl ZerotierTrayApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: &AppConfig, runtime: tokio::runtime::Handle) -> Result<Self> {
        // 后台线程投递事件后唤醒界面
        let ctx = cc.egui_ctx.clone();
        let mut shell = Shell::start(config, None, runtime, move || ctx.request_repaint());

        let rows_dirty = Rc::new(Cell::new(false));
        let dirty = Rc::clone(&rows_dirty);
        shell.view_model_mut().on_property_changed(move |property| {
            if property == MainViewModel::NETWORKS {
                dirty.set(true);
            }
        });

        // 隐藏到托盘用最小化实现，窗口保持映射，后台唤醒仍能驱动 update
        if !shell.window().is_some_and(MainWindow::is_visible) {
            cc.egui_ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(true));
        }

        let tray = TrayHost::spawn(shell.tray_menu())?;
        tray::forward_events(shell.poster(), shell.cancel_token());

        Ok(Self {
            rows: shell.view_model().networks(),
            shell,
            tray: Some(tray),
            config: config.clone(),
            rows_dirty,
            status_message: String::new(),
        })
    }

    fn sync_rows(&mut self) {
        if self.rows_dirty.replace(false) {
            let view_model = self.shell.view_model();
            self.rows = view_model.networks();
            tracing::trace!(revision = view_model.revision(), rows = self.rows.len(), "network rows rebuilt");
        }
    }

    /// 在 UI 线程上执行控制器产生的副作用
    fn apply_effects(&mut self, ctx: &egui::Context) {
        for effect in self.shell.pump() {
            match effect {
                Effect::UpdateTray(menu) => {
                    if let Some(tray) = &self.tray {
                        tray.set_menu(&menu);
                    }
                }
                Effect::ShowWindow => {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
                    ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(false));
                    ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
                }
                Effect::HideWindow => {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(true));
                }
                Effect::Shutdown => {
                    if let Some(mut tray) = self.tray.take() {
                        tray.shutdown();
                    }
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            }
        }
    }

    fn status_color(status: NetworkStatus) -> egui::Color32 {
        match status {
            NetworkStatus::Online => egui::Color32::from_rgb(100, 200, 100),
            NetworkStatus::Offline => egui::Color32::GRAY,
            NetworkStatus::PortError => egui::Color32::RED,
        }
    }

    fn render_network(ui: &mut egui::Ui, network: &NetworkRecord, toggles: &mut Vec<(RouteFlag, String)>) {
        ui.group(|ui| {
            ui.horizontal(|ui| {
                ui.strong(network.label());
                ui.colored_label(Self::status_color(network.status), network.status_label());
            });
            ui.separator();

            for flag in RouteFlag::ALL {
                // 复选框只反映缓存中的值，点击后交给控制器处理
                let mut checked = network.flag(flag);
                if ui.checkbox(&mut checked, flag.label()).changed() {
                    toggles.push((flag, network.id.clone()));
                }
            }
        });
    }
}

impl eframe::App for ZerotierTrayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 关闭窗口只隐藏到托盘，真正退出走 Quit
        if ctx.input(|i| i.viewport().close_requested()) && !self.shell.is_quitting() {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.shell.hide_window();
        }

        self.apply_effects(ctx);

        // 最小化时也照常绘制，从任务栏还原后内容不为空
        self.sync_rows();

        let mut toggles: Vec<(RouteFlag, String)> = Vec::new();
        let mut refresh_clicked = false;
        let mut start_hidden = self.config.start_hidden;

        let view_model = self.shell.view_model();
        let networks = Arc::clone(&self.rows);
        let refreshing = self.shell.loop_state() == LoopState::Refreshing;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(format!("🌐 {}", view_model.title()));
            ui.label(view_model.subtitle());
            ui.add_space(10.0);

            ui.group(|ui| {
                ui.horizontal(|ui| {
                    ui.label("📡 Status");
                    if refreshing {
                        ui.spinner();
                    }
                    if ui.button("🔄 Refresh").clicked() {
                        refresh_clicked = true;
                    }
                });
                ui.separator();

                ui.horizontal(|ui| {
                    ui.label("Last refresh:");
                    match view_model.last_refreshed() {
                        Some(at) => ui.strong(at.with_timezone(&chrono::Local).format("%H:%M:%S").to_string()),
                        None => ui.strong("Never"),
                    };
                });
                ui.horizontal(|ui| {
                    ui.label("Networks:");
                    ui.strong(networks.len().to_string());
                });
                ui.checkbox(&mut start_hidden, "Start hidden in tray");
            });

            ui.add_space(10.0);

            egui::ScrollArea::vertical().show(ui, |ui| {
                if networks.is_empty() {
                    ui.label("No networks joined");
                }
                for network in networks.iter() {
                    Self::render_network(ui, network, &mut toggles);
                    ui.add_space(5.0);
                }
            });

            if !self.status_message.is_empty() {
                ui.add_space(10.0);
                ui.colored_label(egui::Color32::from_rgb(100, 200, 100), &self.status_message);
            }
        });

        // 处理延迟的操作
        if refresh_clicked {
            self.shell.request_refresh();
            self.status_message = "Refresh requested".to_string();
        }
        for (flag, network_id) in toggles {
            self.shell.toggle(flag, &network_id);
        }
        if start_hidden != self.config.start_hidden {
            self.config.start_hidden = start_hidden;
            self.status_message = match self.config.save() {
                Ok(()) => "Settings saved".to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to save config");
                    format!("Failed to save settings: {e}")
                }
            };
        }

        self.apply_effects(ctx);

        // 更新时间显示
        ctx.request_repaint_after(Duration::from_secs(1));
    }
}

impl Drop for ZerotierTrayApp {
    fn drop(&mut self) {
        if let Some(mut tray) = self.tray.take() {
            tray.shutdown();
        }
    }
}
