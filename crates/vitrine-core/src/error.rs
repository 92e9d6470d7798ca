//! Error Types
//!
//! Validation errors raised by the shared domain types.
//!
//! # Example
//!
//! ```
//! use vitrine_core::{CatalogRecord, CoreError};
//!
//! let record = CatalogRecord::new("   ");
//! assert!(matches!(record.validate(), Err(CoreError::BlankKey)));
//! ```

use serde::Serialize;
use thiserror::Error;

/// Validation error for a catalog record.
///
/// A record failing validation is skipped by the engine and never partially
/// written to either the remote catalog or the local store.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreError {
    /// The business key is empty or whitespace-only.
    #[error("Business key is blank")]
    BlankKey,

    /// A field carries a value the engine cannot use.
    #[error("Invalid field '{field}': {message}")]
    InvalidField {
        /// Name of the offending field
        field: String,
        /// Human-readable reason
        message: String,
    },
}

impl CoreError {
    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable error code for reports.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BlankKey => "BLANK_KEY",
            Self::InvalidField { .. } => "INVALID_FIELD",
        }
    }
}

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
