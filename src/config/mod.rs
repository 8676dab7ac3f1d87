use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// 默认刷新间隔（秒）
pub const DEFAULT_REFRESH_SECS: u64 = 30;

fn default_refresh_secs() -> u64 {
    DEFAULT_REFRESH_SECS
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// 后台刷新间隔
    #[serde(default = "default_refresh_secs")]
    pub refresh_interval_secs: u64,
    /// 启动时只显示托盘，不打开主窗口
    #[serde(default)]
    pub start_hidden: bool,
    /// 未设置 RUST_LOG 时使用的日志过滤器
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_SECS,
            start_hidden: false,
            log_filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("zerotier-tray")
            .join("config.json")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// 读取配置；文件缺失或损坏时回退到默认值
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::read(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(Error::Config("refresh_interval_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tray_behaviour() {
        let config = AppConfig::default();
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert!(!config.start_hidden);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("nope.json"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            refresh_interval_secs: 5,
            start_hidden: true,
            log_filter: "debug".into(),
        };
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path), config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "start_hidden": true }"#).unwrap();

        let config = AppConfig::load_from(&path);
        assert!(config.start_hidden);
        assert_eq!(config.refresh_interval_secs, DEFAULT_REFRESH_SECS);
    }

    #[test]
    fn invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, "not json").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());

        fs::write(&path, r#"{ "refresh_interval_secs": 0 }"#).unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
    }
}
