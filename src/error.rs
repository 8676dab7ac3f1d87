/// 应用错误类型
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 刷新或操作被取消（不是真正的错误）
    #[error("cancelled")]
    Cancelled,

    #[error("no network tool configured")]
    NoTool,

    #[error("network tool error: {0}")]
    Tool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tray error: {0}")]
    Tray(String),

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<tray_icon::Error> for Error {
    fn from(e: tray_icon::Error) -> Self {
        Error::Tray(e.to_string())
    }
}

impl From<tray_icon::menu::Error> for Error {
    fn from(e: tray_icon::menu::Error) -> Self {
        Error::Tray(e.to_string())
    }
}

impl From<tray_icon::BadIcon> for Error {
    fn from(e: tray_icon::BadIcon) -> Self {
        Error::Tray(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
