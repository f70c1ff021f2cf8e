//! Storage-level errors and their mapping into the core taxonomy.

use clientsync_core::errors::{DatabaseError, Error};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error("Query failed: {0}")]
    QueryFailed(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    PoolFailed(#[from] diesel::r2d2::PoolError),

    #[error("Connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error(transparent)]
    Core(#[from] Error),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::QueryFailed(e) => {
                Error::Database(DatabaseError::QueryFailed(e.to_string()))
            }
            StorageError::PoolFailed(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::ConnectionFailed(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            err @ StorageError::MigrationFailed(_) => Error::Schema(err.to_string()),
            StorageError::Core(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_failures_are_schema_errors() {
        let err: Error = StorageError::MigrationFailed("near \"TABL\": syntax error".into()).into();
        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(
            err.to_string(),
            "Schema error: Migration failed: near \"TABL\": syntax error"
        );
    }

    #[test]
    fn core_errors_pass_through() {
        let err: Error = StorageError::from(Error::persistence_at(3, "missing client_id")).into();
        assert_eq!(err.record_index(), Some(3));
    }

    #[test]
    fn diesel_errors_are_query_failures() {
        let err: Error = StorageError::from(diesel::result::Error::NotFound).into();
        assert!(matches!(err, Error::Database(DatabaseError::QueryFailed(_))));
    }
}
