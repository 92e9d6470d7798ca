//! Remote catalog error types
//!
//! Error definitions with transient/permanent classification for retry logic.

use thiserror::Error;

/// Error that can occur during remote catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    // Connection errors (transient)
    /// Failed to reach the remote catalog.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Request timed out.
    #[error("request timeout after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Remote catalog is temporarily unavailable.
    #[error("remote catalog unavailable: {message}")]
    Unavailable { message: String },

    /// Network error during communication.
    #[error("network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Remote API throttled the request.
    #[error("rate limited{}", retry_after_ms.map(|ms| format!(" (retry after {ms}ms)")).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },

    // Authentication errors (permanent)
    /// Credentials were rejected.
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    // Entity errors (permanent)
    /// Entry not found.
    #[error("entry not found: {identifier}")]
    NotFound { identifier: String },

    /// An entry with the same business key already exists.
    #[error("entry already exists: {identifier}")]
    AlreadyExists { identifier: String },

    /// The remote API rejected the payload.
    #[error("invalid data: {message}")]
    InvalidData { message: String },

    /// The remote API refused the operation.
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Retry errors
    /// Retries exhausted for an operation.
    #[error("maximum retries ({max_retries}) exceeded for {operation}: {last_error}")]
    MaxRetriesExceeded {
        operation: String,
        max_retries: u32,
        last_error: String,
    },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CatalogError {
    /// Check if this error is transient and the operation should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CatalogError::ConnectionFailed { .. }
                | CatalogError::Timeout { .. }
                | CatalogError::Unavailable { .. }
                | CatalogError::NetworkError { .. }
                | CatalogError::RateLimited { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Whether the error reports a missing entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound { .. })
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            CatalogError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            CatalogError::Timeout { .. } => "TIMEOUT",
            CatalogError::Unavailable { .. } => "UNAVAILABLE",
            CatalogError::NetworkError { .. } => "NETWORK_ERROR",
            CatalogError::RateLimited { .. } => "RATE_LIMITED",
            CatalogError::AuthenticationFailed => "AUTH_FAILED",
            CatalogError::NotFound { .. } => "NOT_FOUND",
            CatalogError::AlreadyExists { .. } => "ALREADY_EXISTS",
            CatalogError::InvalidData { .. } => "INVALID_DATA",
            CatalogError::OperationFailed { .. } => "OPERATION_FAILED",
            CatalogError::MaxRetriesExceeded { .. } => "MAX_RETRIES_EXCEEDED",
            CatalogError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        CatalogError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        CatalogError::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        CatalogError::NetworkError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not found error.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        CatalogError::NotFound {
            identifier: identifier.into(),
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        CatalogError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        CatalogError::InvalidData {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        CatalogError::Internal {
            message: message.into(),
        }
    }
}

/// Result type for remote catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        let transient_errors = vec![
            CatalogError::connection_failed("test"),
            CatalogError::Timeout { timeout_secs: 30 },
            CatalogError::Unavailable {
                message: "maintenance".to_string(),
            },
            CatalogError::network("reset by peer"),
            CatalogError::RateLimited {
                retry_after_ms: Some(500),
            },
        ];

        for err in transient_errors {
            assert!(
                err.is_transient(),
                "Expected {} to be transient",
                err.error_code()
            );
        }
    }

    #[test]
    fn test_permanent_errors() {
        let permanent_errors = vec![
            CatalogError::AuthenticationFailed,
            CatalogError::not_found("gid://catalog/Product/1"),
            CatalogError::AlreadyExists {
                identifier: "T-1".to_string(),
            },
            CatalogError::invalid_data("title too long"),
            CatalogError::operation_failed("options locked"),
        ];

        for err in permanent_errors {
            assert!(
                err.is_permanent(),
                "Expected {} to be permanent",
                err.error_code()
            );
        }
    }

    #[test]
    fn test_error_display() {
        let err = CatalogError::RateLimited {
            retry_after_ms: Some(250),
        };
        assert_eq!(err.to_string(), "rate limited (retry after 250ms)");

        let err = CatalogError::RateLimited {
            retry_after_ms: None,
        };
        assert_eq!(err.to_string(), "rate limited");
    }

    #[test]
    fn test_not_found_helper() {
        assert!(CatalogError::not_found("x").is_not_found());
        assert!(!CatalogError::network("x").is_not_found());
    }
}
