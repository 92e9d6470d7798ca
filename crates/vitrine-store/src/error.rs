//! Error types for the vitrine-store crate.

use thiserror::Error;
use vitrine_core::{CoreError, RemoteEntryId};

/// Local store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    /// No row exists for the business key.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A save attempted to change an already-assigned remote identifier.
    ///
    /// Remote identifiers only change through an audited correction.
    #[error("Remote id of '{business_key}' is immutable (stored {stored:?}, attempted {attempted:?})")]
    RemoteIdImmutable {
        business_key: String,
        stored: Option<RemoteEntryId>,
        attempted: Option<RemoteEntryId>,
    },

    /// The record failed validation.
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] CoreError),

    /// The store refused the write.
    #[error("Write failed: {0}")]
    WriteFailed(String),
}

impl StoreError {
    /// Check if this error indicates a connection problem.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed(_)
                | StoreError::QueryFailed(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
        )
    }

    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::ConnectionFailed(_) => "STORE_CONNECTION_FAILED",
            StoreError::MigrationFailed(_) => "STORE_MIGRATION_FAILED",
            StoreError::QueryFailed(_) => "STORE_QUERY_FAILED",
            StoreError::NotFound(_) => "STORE_NOT_FOUND",
            StoreError::RemoteIdImmutable { .. } => "REMOTE_ID_IMMUTABLE",
            StoreError::ValidationFailed(_) => "STORE_VALIDATION_FAILED",
            StoreError::WriteFailed(_) => "STORE_WRITE_FAILED",
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
