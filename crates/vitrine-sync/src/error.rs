//! Sync error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vitrine_catalog::CatalogError;
use vitrine_core::{CoreError, RemoteEntryId};
use vitrine_store::StoreError;

use crate::orchestrator::SyncAction;

/// Failure taxonomy used in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network or rate-limit failure, retried before being reported.
    Transient,
    /// Malformed record or unusable business key.
    Validation,
    /// Remote state broke a catalog invariant; corrected on reconciliation.
    InvariantViolation,
    /// Permanent remote catalog failure.
    Remote,
    /// Local store failure.
    Store,
    /// Repair refused because it would delete too much.
    SafetyThreshold,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Validation => "validation",
            ErrorKind::InvariantViolation => "invariant_violation",
            ErrorKind::Remote => "remote",
            ErrorKind::Store => "store",
            ErrorKind::SafetyThreshold => "safety_threshold",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors loading a feed snapshot.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed could not be reached.
    #[error("Feed '{source_name}' unavailable: {message}")]
    Unavailable { source_name: String, message: String },

    /// The feed content could not be parsed.
    #[error("Feed parse error: {message}")]
    Parse { message: String },
}

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            var: var.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur while synchronizing a record.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote catalog call failed.
    #[error("Remote catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Local store call failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Record failed validation.
    #[error("Invalid record: {0}")]
    Validation(#[from] CoreError),

    /// The same business key appeared more than once in a snapshot.
    #[error("Duplicate business key '{business_key}' in feed snapshot")]
    DuplicateKey { business_key: String },

    /// The store references a remote entry that no longer exists.
    #[error("Remote entry {remote_id} for '{business_key}' is missing")]
    RemoteEntryMissing {
        business_key: String,
        remote_id: RemoteEntryId,
    },

    /// A catalog invariant does not hold after a mutation.
    #[error("Invariant violated for '{business_key}': {message}")]
    InvariantViolation {
        business_key: String,
        message: String,
    },

    /// Collection memberships were only partly applied.
    #[error("Collection memberships partially applied for '{business_key}': {message}")]
    PartialMembership {
        business_key: String,
        message: String,
    },

    /// Feed snapshot could not be loaded.
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl SyncError {
    /// Create an invariant violation.
    pub fn invariant(business_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            business_key: business_key.into(),
            message: message.into(),
        }
    }

    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Catalog(e) if e.is_transient() => ErrorKind::Transient,
            SyncError::Catalog(CatalogError::MaxRetriesExceeded { .. }) => ErrorKind::Transient,
            SyncError::Catalog(_) | SyncError::RemoteEntryMissing { .. } => ErrorKind::Remote,
            SyncError::Store(e) if e.is_connection_error() => ErrorKind::Transient,
            SyncError::Store(_) => ErrorKind::Store,
            SyncError::Validation(_)
            | SyncError::DuplicateKey { .. }
            | SyncError::Configuration(_) => ErrorKind::Validation,
            SyncError::InvariantViolation { .. } | SyncError::PartialMembership { .. } => {
                ErrorKind::InvariantViolation
            }
            SyncError::Feed(FeedError::Unavailable { .. }) => ErrorKind::Transient,
            SyncError::Feed(FeedError::Parse { .. }) => ErrorKind::Validation,
        }
    }

    /// Check if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Catalog(e) => e.error_code(),
            SyncError::Store(e) => e.error_code(),
            SyncError::Validation(e) => e.error_code(),
            SyncError::DuplicateKey { .. } => "DUPLICATE_KEY",
            SyncError::RemoteEntryMissing { .. } => "REMOTE_ENTRY_MISSING",
            SyncError::InvariantViolation { .. } => "INVARIANT_VIOLATION",
            SyncError::PartialMembership { .. } => "PARTIAL_MEMBERSHIP",
            SyncError::Feed(_) => "FEED_ERROR",
            SyncError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// A per-record failure, with enough identity to act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub business_key: String,
    pub operation: SyncAction,
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
}

impl RecordError {
    /// Build a record error from a sync error.
    pub fn new(business_key: impl Into<String>, operation: SyncAction, error: &SyncError) -> Self {
        Self {
            business_key: business_key.into(),
            operation,
            kind: error.kind(),
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Errors that abort a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// Too many deletions proposed; repair refused without force.
    #[error(
        "Safety threshold exceeded: {proposed_deletions} of {total_catalog_size} entries proposed for deletion (max ratio {max_ratio})"
    )]
    SafetyThresholdExceeded {
        proposed_deletions: usize,
        total_catalog_size: usize,
        max_ratio: f64,
    },

    /// Remote catalog snapshot failed.
    #[error("Remote catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Store snapshot failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Feed snapshot failed.
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}

impl ReconciliationError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconciliationError::SafetyThresholdExceeded { .. } => ErrorKind::SafetyThreshold,
            ReconciliationError::Catalog(e) if e.is_transient() => ErrorKind::Transient,
            ReconciliationError::Catalog(_) => ErrorKind::Remote,
            ReconciliationError::Store(_) => ErrorKind::Store,
            ReconciliationError::Feed(_) => ErrorKind::Transient,
        }
    }
}
