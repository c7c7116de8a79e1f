use std::fmt;
use std::io::Error as IoError;
use serde_json::Error as JsonError;
use tokio_tungstenite::tungstenite::Error as WsError;

#[derive(Debug)]
pub enum AppError {
    Ws(WsError),
    Io(IoError),
    Json(JsonError),
    Config(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Ws(e) => write!(f, "WebSocket error: {}", e),
            AppError::Io(e) => write!(f, "IO error: {}", e),
            AppError::Json(e) => write!(f, "Malformed payload: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Ws(e) => Some(e),
            AppError::Io(e) => Some(e),
            AppError::Json(e) => Some(e),
            AppError::Config(_) => None,
        }
    }
}

impl From<WsError> for AppError {
    fn from(err: WsError) -> Self {
        AppError::Ws(err)
    }
}

impl From<IoError> for AppError {
    fn from(err: IoError) -> Self {
        AppError::Io(err)
    }
}

impl From<JsonError> for AppError {
    fn from(err: JsonError) -> Self {
        AppError::Json(err)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
