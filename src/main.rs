mod cache;
mod config;
mod error;
mod gui;
mod network;
mod refresh;
mod shell;
mod tray;
mod viewmodel;

#[cfg(test)]
mod testing;

use eframe::egui;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

fn init_logging(default_filter: &str) {
    // RUST_LOG 优先，其次是配置文件中的过滤器
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load();
    init_logging(&config.log_filter);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %AppConfig::config_path().display(),
        "starting zerotier tray"
    );

    // 后台刷新运行在独立的运行时上，界面占用主线程
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("zerotier-refresh")
        .enable_all()
        .build()?;
    let handle = runtime.handle().clone();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([420.0, 520.0])
            .with_min_inner_size([360.0, 360.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Zerotier GUI",
        options,
        Box::new(move |cc| Ok(Box::new(gui::ZerotierTrayApp::new(cc, &config, handle)?))),
    )
    .map_err(|e| anyhow::anyhow!("ui exited with error: {e}"))?;

    runtime.shutdown_timeout(Duration::from_secs(1));
    tracing::info!("zerotier tray stopped");
    Ok(())
}
