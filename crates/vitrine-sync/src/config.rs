//! Engine configuration.
//!
//! Loaded from `VITRINE_*` environment variables with fail-fast validation,
//! or deserialized from any serde source with the defaults below.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vitrine_catalog::{RetryConfig, DEFAULT_LOCATION};
use vitrine_core::LocationId;

use crate::collections::CollectionMapping;
use crate::error::ConfigError;

/// Retry behaviour for remote catalog calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_true(),
        }
    }
}

impl RetrySettings {
    /// Convert to the catalog retry configuration.
    #[must_use]
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter: self.jitter,
        }
    }
}

/// Stock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySettings {
    /// Location whose level carries the unit's stock.
    #[serde(default = "default_primary_location")]
    pub primary_location: LocationId,
}

fn default_primary_location() -> LocationId {
    LocationId::new(DEFAULT_LOCATION)
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            primary_location: default_primary_location(),
        }
    }
}

/// Reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationSettings {
    /// Largest share of the catalog a repair may delete without force.
    #[serde(default = "default_max_deletion_ratio")]
    pub max_deletion_ratio: f64,
    /// Report repair actions without executing them.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_max_deletion_ratio() -> f64 {
    0.10
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            max_deletion_ratio: default_max_deletion_ratio(),
            dry_run: false,
        }
    }
}

/// Configuration for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Records processed concurrently (1 = sequential).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Classify and plan without mutating the catalog or the store.
    #[serde(default)]
    pub dry_run: bool,
    /// Re-read and check each entry after mutating it.
    #[serde(default = "default_true")]
    pub verify_after_mutation: bool,
    /// Remote calls per second (unlimited when unset).
    #[serde(default)]
    pub rate_limit_per_second: Option<u64>,
    /// How long a loaded feed snapshot stays fresh.
    #[serde(default = "default_feed_cache_ttl_secs")]
    pub feed_cache_ttl_secs: u64,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub inventory: InventorySettings,
    #[serde(default)]
    pub collections: CollectionMapping,
    #[serde(default)]
    pub reconciliation: ReconciliationSettings,
}

fn default_max_concurrency() -> usize {
    1
}

fn default_feed_cache_ttl_secs() -> u64 {
    300
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            dry_run: false,
            verify_after_mutation: default_true(),
            rate_limit_per_second: None,
            feed_cache_ttl_secs: default_feed_cache_ttl_secs(),
            retry: RetrySettings::default(),
            inventory: InventorySettings::default(),
            collections: CollectionMapping::default(),
            reconciliation: ReconciliationSettings::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// `VITRINE_PRIMARY_LOCATION` is required; everything else falls back to
    /// its default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let location = lookup("VITRINE_PRIMARY_LOCATION")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("VITRINE_PRIMARY_LOCATION".to_string()))?;
        config.inventory.primary_location = LocationId::new(location.trim());

        if let Some(v) = parse_var(&lookup, "VITRINE_MAX_CONCURRENCY")? {
            config.max_concurrency = v;
        }
        if let Some(v) = parse_var(&lookup, "VITRINE_DRY_RUN")? {
            config.dry_run = v;
        }
        if let Some(v) = parse_var(&lookup, "VITRINE_VERIFY_AFTER_MUTATION")? {
            config.verify_after_mutation = v;
        }
        if let Some(v) = parse_var(&lookup, "VITRINE_RATE_LIMIT_PER_SECOND")? {
            config.rate_limit_per_second = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "VITRINE_FEED_CACHE_TTL_SECS")? {
            config.feed_cache_ttl_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "VITRINE_MAX_RETRIES")? {
            config.retry.max_retries = v;
        }
        if let Some(v) = parse_var(&lookup, "VITRINE_RETRY_INITIAL_DELAY_MS")? {
            config.retry.initial_delay_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "VITRINE_MAX_DELETION_RATIO")? {
            config.reconciliation.max_deletion_ratio = v;
        }
        if let Some(v) = parse_var(&lookup, "VITRINE_RECONCILIATION_DRY_RUN")? {
            config.reconciliation.dry_run = v;
        }
        if let Some(json) = lookup("VITRINE_COLLECTIONS").filter(|v| !v.trim().is_empty()) {
            config.collections = serde_json::from_str(&json)
                .map_err(|e| ConfigError::invalid("VITRINE_COLLECTIONS", e.to_string()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::invalid(
                "max_concurrency",
                "must be at least 1",
            ));
        }
        let ratio = self.reconciliation.max_deletion_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::invalid(
                "max_deletion_ratio",
                format!("must be in (0, 1], got {ratio}"),
            ));
        }
        if self.inventory.primary_location.as_str().trim().is_empty() {
            return Err(ConfigError::invalid("primary_location", "must not be blank"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "backoff_multiplier",
                "must be at least 1.0",
            ));
        }
        if self.rate_limit_per_second == Some(0) {
            return Err(ConfigError::invalid(
                "rate_limit_per_second",
                "must be positive when set",
            ));
        }
        self.collections
            .validate()
            .map_err(|message| ConfigError::invalid("collections", message))?;
        Ok(())
    }

    /// Feed cache time-to-live.
    #[must_use]
    pub fn feed_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.feed_cache_ttl_secs)
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::invalid(name, e.to_string())),
        _ => Ok(None),
    }
}
