//! Error types shared by every clientsync crate.

use thiserror::Error;

/// Result type alias used across the core crate and its implementors.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the local database that are not tied to a specific write.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Failed to create connection pool: {0}")]
    PoolCreationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Top-level error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    /// Schema creation or migration failed. The store cannot be used.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A local write failed and was rolled back.
    #[error("{}", persistence_message(.index, .message))]
    Persistence {
        index: Option<usize>,
        message: String,
    },

    /// Transport failure talking to the remote (timeout, DNS, refused connection).
    #[error("Network error: {0}")]
    Network(String),

    /// The remote answered, but not with a valid sync payload.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn persistence_message(index: &Option<usize>, message: &str) -> String {
    match index {
        Some(idx) => format!("Persistence error at record {}: {}", idx, message),
        None => format!("Persistence error: {}", message),
    }
}

impl Error {
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            index: None,
            message: message.into(),
        }
    }

    pub fn persistence_at(index: usize, message: impl Into<String>) -> Self {
        Self::Persistence {
            index: Some(index),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Remote failures may be retried by the caller; local failures may not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Protocol(_))
    }

    /// Index of the offending record for a failed batch write.
    pub fn record_index(&self) -> Option<usize> {
        match self {
            Self::Persistence { index, .. } => *index,
            _ => None,
        }
    }
}
