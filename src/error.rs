use thiserror::Error;
use std::io;

#[derive(Debug, Error)]
pub enum AppError {
    /// The request never produced a response: connection failure, abort or timeout.
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP error! status: {0}")]
    HttpError(u16),

    #[error("JSON serialization/deserialization error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl AppError {
    /// Status code of a failed request, "parse" for an unusable body,
    /// or "network" when no response was received.
    pub fn status_label(&self) -> String {
        match self {
            AppError::HttpError(status) => status.to_string(),
            AppError::ParseError(_) => "parse".to_string(),
            _ => "network".to_string(),
        }
    }

    /// Whether the failure happened on the wire (as opposed to config or local I/O).
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_) | AppError::HttpError(_) | AppError::ParseError(_)
        )
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return AppError::HttpError(status.as_u16());
        }
        if e.is_timeout() {
            return AppError::NetworkError(format!("request timed out: {}", e));
        }
        AppError::NetworkError(e.to_string())
    }
}
