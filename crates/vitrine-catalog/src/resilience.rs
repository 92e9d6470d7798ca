//! Resilience patterns for remote catalog calls.
//!
//! Bounded retry with exponential backoff for transient failures, and a
//! [`ResilientCatalog`] decorator applying it (plus optional rate limiting)
//! to every call of a wrapped catalog.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vitrine_core::{CollectionId, LocationId, RemoteEntryId, VariantId};

use crate::error::{CatalogError, CatalogResult};
use crate::rate_limiter::TokenBucket;
use crate::traits::{CollectionOps, EntryOps, FullCatalog, InventoryOps, OptionOps, RemoteCatalog};
use crate::types::{EntryDraft, EntryPatch, OptionAxis, RemoteCatalogEntry};

/// Configuration for retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Retry executor with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor with the given configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a new retry executor with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Get the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Calculate delay for a given attempt (0-indexed).
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_multiplier.powi(attempt as i32);

        let delay_ms = base_delay.min(self.config.max_delay.as_millis() as f64);

        let final_delay = if self.config.jitter {
            // Add up to 25% jitter
            let jitter_factor = 1.0 + (rand_simple() * 0.25);
            delay_ms * jitter_factor
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Execute an operation, retrying transient failures.
    ///
    /// Permanent errors are returned as-is on the first occurrence. When every
    /// attempt fails transiently the result is `MaxRetriesExceeded`.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> CatalogResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CatalogResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= self.config.max_retries => {
                    if self.config.max_retries == 0 {
                        return Err(e);
                    }
                    warn!(
                        operation,
                        attempts = attempt + 1,
                        error = %e,
                        "Retries exhausted for remote catalog call"
                    );
                    return Err(CatalogError::MaxRetriesExceeded {
                        operation: operation.to_string(),
                        max_retries: self.config.max_retries,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.calculate_delay(attempt);
                    debug!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Simple pseudo-random number generator for jitter.
fn rand_simple() -> f64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64,
    );
    (hasher.finish() as f64) / (u64::MAX as f64)
}

/// Catalog decorator adding retry and rate limiting to every call.
pub struct ResilientCatalog {
    inner: Arc<dyn FullCatalog>,
    retry: RetryExecutor,
    rate_limiter: Option<Arc<TokenBucket>>,
}

impl ResilientCatalog {
    /// Wrap a catalog with the given retry configuration.
    pub fn new(inner: Arc<dyn FullCatalog>, retry: RetryConfig) -> Self {
        Self {
            inner,
            retry: RetryExecutor::new(retry),
            rate_limiter: None,
        }
    }

    /// Throttle calls through a token bucket.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<TokenBucket>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Get the wrapped catalog.
    pub fn inner(&self) -> &Arc<dyn FullCatalog> {
        &self.inner
    }

    async fn call<F, Fut, T>(&self, operation: &str, mut f: F) -> CatalogResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = CatalogResult<T>> + Send,
        T: Send,
    {
        let limiter = self.rate_limiter.as_deref();
        self.retry
            .execute(operation, move || {
                let fut = f();
                async move {
                    if let Some(limiter) = limiter {
                        limiter.acquire().await;
                    }
                    fut.await
                }
            })
            .await
    }
}

#[async_trait]
impl RemoteCatalog for ResilientCatalog {
    fn display_name(&self) -> &str {
        self.inner.display_name()
    }

    fn is_healthy(&self) -> bool {
        self.inner.is_healthy()
    }
}

#[async_trait]
impl EntryOps for ResilientCatalog {
    /// Create an entry, retrying transient failures.
    ///
    /// A create is not idempotent: a transient failure may hide a create
    /// the platform applied. Every retry first looks the SKU up and returns
    /// the entry it finds instead of creating a second one.
    async fn create_entry(&self, draft: &EntryDraft) -> CatalogResult<RemoteCatalogEntry> {
        let attempted = AtomicBool::new(false);
        let inner = &self.inner;
        self.call("create_entry", || {
            let retrying = attempted.swap(true, Ordering::SeqCst);
            async move {
                if retrying {
                    if let Some(existing) = inner.find_by_business_key(&draft.sku).await? {
                        warn!(
                            sku = %draft.sku,
                            entry_id = %existing.id,
                            "Create applied before transient failure; reusing entry"
                        );
                        return Ok(existing);
                    }
                }
                inner.create_entry(draft).await
            }
        })
        .await
    }

    async fn update_entry(
        &self,
        id: &RemoteEntryId,
        patch: &EntryPatch,
    ) -> CatalogResult<RemoteCatalogEntry> {
        self.call("update_entry", || self.inner.update_entry(id, patch))
            .await
    }

    async fn delete_entry(&self, id: &RemoteEntryId) -> CatalogResult<()> {
        self.call("delete_entry", || self.inner.delete_entry(id)).await
    }

    async fn get_entry(&self, id: &RemoteEntryId) -> CatalogResult<RemoteCatalogEntry> {
        self.call("get_entry", || self.inner.get_entry(id)).await
    }

    async fn list_all(&self) -> CatalogResult<Vec<RemoteCatalogEntry>> {
        self.call("list_all", || self.inner.list_all()).await
    }

    async fn find_by_business_key(&self, sku: &str) -> CatalogResult<Option<RemoteCatalogEntry>> {
        self.call("find_by_business_key", || {
            self.inner.find_by_business_key(sku)
        })
        .await
    }
}

#[async_trait]
impl OptionOps for ResilientCatalog {
    async fn create_options(
        &self,
        id: &RemoteEntryId,
        axes: &[OptionAxis],
    ) -> CatalogResult<RemoteCatalogEntry> {
        self.call("create_options", || self.inner.create_options(id, axes))
            .await
    }

    async fn remove_options(&self, id: &RemoteEntryId) -> CatalogResult<RemoteCatalogEntry> {
        self.call("remove_options", || self.inner.remove_options(id))
            .await
    }

    async fn set_variant_option_values(
        &self,
        id: &RemoteEntryId,
        variant_id: &VariantId,
        values: &[String],
    ) -> CatalogResult<()> {
        self.call("set_variant_option_values", || {
            self.inner.set_variant_option_values(id, variant_id, values)
        })
        .await
    }
}

#[async_trait]
impl InventoryOps for ResilientCatalog {
    async fn set_inventory_level(
        &self,
        variant_id: &VariantId,
        location_id: &LocationId,
        level: i64,
    ) -> CatalogResult<()> {
        self.call("set_inventory_level", || {
            self.inner.set_inventory_level(variant_id, location_id, level)
        })
        .await
    }
}

#[async_trait]
impl CollectionOps for ResilientCatalog {
    async fn add_collection_membership(
        &self,
        entry_id: &RemoteEntryId,
        collection_id: &CollectionId,
    ) -> CatalogResult<()> {
        self.call("add_collection_membership", || {
            self.inner.add_collection_membership(entry_id, collection_id)
        })
        .await
    }

    async fn remove_collection_membership(
        &self,
        entry_id: &RemoteEntryId,
        collection_id: &CollectionId,
    ) -> CatalogResult<()> {
        self.call("remove_collection_membership", || {
            self.inner.remove_collection_membership(entry_id, collection_id)
        })
        .await
    }

    async fn list_collection_memberships(
        &self,
        entry_id: &RemoteEntryId,
    ) -> CatalogResult<Vec<CollectionId>> {
        self.call("list_collection_memberships", || {
            self.inner.list_collection_memberships(entry_id)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCatalog;
    use std::sync::atomic::AtomicUsize;

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_retry_executor_succeeds_first_try() {
        let executor = RetryExecutor::with_defaults();
        let call_count = AtomicUsize::new(0);

        let result = executor
            .execute("get_entry", || {
                call_count.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, CatalogError>(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_executor_retries_on_transient_error() {
        let executor = RetryExecutor::new(fast_retry(3));
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let result = executor
            .execute("create_entry", move || {
                let count = call_count_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count < 2 {
                        Err(CatalogError::RateLimited {
                            retry_after_ms: None,
                        })
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_executor_fails_on_permanent_error() {
        let executor = RetryExecutor::new(fast_retry(3));
        let call_count = AtomicUsize::new(0);

        let result: CatalogResult<i32> = executor
            .execute("update_entry", || {
                call_count.fetch_add(1, Ordering::SeqCst);
                async { Err(CatalogError::invalid_data("bad title")) }
            })
            .await;

        assert!(matches!(result, Err(CatalogError::InvalidData { .. })));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_executor_exhausts() {
        let executor = RetryExecutor::new(fast_retry(2));
        let call_count = AtomicUsize::new(0);

        let result: CatalogResult<i32> = executor
            .execute("set_inventory_level", || {
                call_count.fetch_add(1, Ordering::SeqCst);
                async { Err(CatalogError::network("reset")) }
            })
            .await;

        match result {
            Err(CatalogError::MaxRetriesExceeded {
                operation,
                max_retries,
                ..
            }) => {
                assert_eq!(operation, "set_inventory_level");
                assert_eq!(max_retries, 2);
            }
            other => panic!("expected MaxRetriesExceeded, got {other:?}"),
        }
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_calculate_delay_exponential_backoff() {
        let executor = RetryExecutor::new(RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            jitter: false,
        });

        assert_eq!(executor.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(executor.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(executor.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(executor.calculate_delay(5), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_resilient_catalog_delegates() {
        let memory = Arc::new(InMemoryCatalog::new());
        let catalog = ResilientCatalog::new(memory.clone(), fast_retry(1))
            .with_rate_limiter(Arc::new(TokenBucket::per_second(100)));

        let entry = catalog
            .create_entry(&EntryDraft {
                title: "Omega Speedmaster".to_string(),
                sku: "T-9".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let fetched = catalog.get_entry(&entry.id).await.unwrap();
        assert_eq!(fetched.sku, "T-9");
        assert_eq!(catalog.display_name(), memory.display_name());
        assert_eq!(memory.call_count("create_entry").await, 1);
    }
}
