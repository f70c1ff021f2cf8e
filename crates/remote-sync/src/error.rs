//! Error types for the remote sync crate.

use thiserror::Error;

use clientsync_core::errors::Error as CoreError;

/// Result type alias for remote sync operations.
pub type Result<T> = std::result::Result<T, RemoteSyncError>;

/// Retry policy class for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRetryClass {
    Retryable,
    Permanent,
}

/// Errors that can occur while talking to the sync server.
#[derive(Debug, Error)]
pub enum RemoteSyncError {
    /// Transport failure (timeout, DNS, refused connection, broken body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body is not the JSON we expect
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx response from the server
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Well-formed JSON carrying invalid records
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Client could not be constructed (bad base URL, TLS backend failure)
    #[error("Client configuration error: {0}")]
    Config(String),
}

impl RemoteSyncError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transport-level failure, as opposed to a bad answer.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Http(err) => !err.is_decode(),
            _ => false,
        }
    }

    /// Classify error for retry policy. The client never retries on its own;
    /// this is advice for the caller.
    pub fn retry_class(&self) -> ApiRetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                408 | 409 | 423 | 425 | 429 => ApiRetryClass::Retryable,
                500..=599 => ApiRetryClass::Retryable,
                _ => ApiRetryClass::Permanent,
            },
            Self::Http(_) => ApiRetryClass::Retryable,
            Self::Json(_) | Self::InvalidPayload(_) | Self::Config(_) => ApiRetryClass::Permanent,
        }
    }
}

impl From<RemoteSyncError> for CoreError {
    fn from(err: RemoteSyncError) -> Self {
        match err {
            RemoteSyncError::Config(message) => CoreError::Config(message),
            other if other.is_network() => CoreError::Network(other.to_string()),
            other => CoreError::Protocol(other.to_string()),
        }
    }
}
