//! Structured JSON logging setup using tracing.
//!
//! Hosts embedding the engine call [`init_logging`] once at startup. Output
//! is one JSON object per event with the event fields flattened, suitable
//! for log aggregation.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::ConfigError;

/// Initialize the tracing subscriber with JSON logging.
///
/// `RUST_LOG` takes precedence over `filter` when set.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if the filter directive does not
/// parse or a global subscriber is already installed.
pub fn init_logging(filter: &str) -> Result<(), ConfigError> {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| ConfigError::invalid("RUST_LOG", e.to_string()))?;

    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter_layer)
        .try_init()
        .map_err(|e| ConfigError::invalid("logging", e.to_string()))?;

    tracing::info!(filter = %filter, "Logging initialized");
    Ok(())
}

/// Initialize logging for tests. Safe to call more than once.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .try_init();
}
