//! Error types for remote calls and host-facing operations

use thiserror::Error;

/// Failure of a single remote API call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// No response at all (connection refused, timeout, empty body)
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// The server answered but `status` was not 1
    #[error("API error (status {status}): {error}")]
    Status { status: i64, error: String },

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Pairing failed: {0}")]
    Pairing(String),
}

impl ApiError {
    /// True when the server never produced a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    /// The `error` string reported by the server, if any.
    pub fn server_error(&self) -> Option<&str> {
        match self {
            ApiError::Status { error, .. } => Some(error.as_str()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Parse(err.to_string())
    }
}

/// Result of a host-facing request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PvrError {
    /// Unknown channel, EPG entry, recording or timer
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The item exists but is PIN-locked and was not unlocked
    #[error("Rejected: PIN required")]
    Rejected,

    #[error("Server error: {0}")]
    ServerError(String),
}

impl From<ApiError> for PvrError {
    fn from(err: ApiError) -> Self {
        PvrError::ServerError(err.to_string())
    }
}
