use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for fetchgate operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Message returned to callers for any failed dispatch. Upstream detail stays server-side.
pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed";

/// Fetchgate error types
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream responded with status {status}")]
    Upstream { status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            FetchError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FetchError::InvalidMethod(_) => StatusCode::BAD_REQUEST,
            FetchError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            FetchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            FetchError::Upstream { status } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            FetchError::Transport(_) => StatusCode::BAD_GATEWAY,
            FetchError::Decode(_) => StatusCode::BAD_GATEWAY,
            FetchError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
            FetchError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error was caused by malformed caller input rather than a failed dispatch
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            FetchError::InvalidMethod(_) | FetchError::InvalidPath(_) | FetchError::InvalidRequest(_)
        )
    }

    /// Cancellation is an outcome, not a failure; callers use this to swallow it
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// Upstream status code carried by this error, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            FetchError::Upstream { status } => Some(*status),
            _ => None,
        }
    }

    /// Text that is safe to show to an untrusted caller
    pub fn public_message(&self) -> String {
        if self.is_invalid_input() {
            self.to_string()
        } else {
            GENERIC_FAILURE_MESSAGE.to_string()
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

impl IntoResponse for FetchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}
