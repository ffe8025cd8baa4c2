//! Gateway errors.

use serde_json::Value;

/// Failure of a single backend call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (connection, timeout).
    #[error("Request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("Request rejected ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Rejected { status: u16, detail: Option<String> },

    /// The response body did not match the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// The request could not be built, e.g. from a malformed base URL.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub const UNAUTHORIZED: u16 = 401;

    /// Build a rejection from a status code and the raw response body.
    pub fn rejected(status: u16, body: &str) -> Self {
        ApiError::Rejected {
            status,
            detail: parse_detail(body),
        }
    }

    /// Backend-provided human readable detail, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The token was refused.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(Self::UNAUTHORIZED)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_timeout() {
            ApiError::Transport("request timed out".to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Extract `detail` from an error body.
///
/// The backend sends either `{"detail": "message"}` or, for request
/// validation failures, `{"detail": [{"msg": "message", ...}, ...]}`.
pub fn parse_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(message) if !message.trim().is_empty() => Some(message.clone()),
        Value::Array(items) => items
            .iter()
            .find_map(|item| item.get("msg").and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}
