//! Composition root.
//!
//! [`CatalogSyncService`] wires a remote catalog, a record store and a feed
//! into one engine: the catalog is wrapped with retries and optional rate
//! limiting, the feed with a TTL cache, and both the orchestrator and the
//! auditor share the same wrapped catalog.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use vitrine_catalog::{FullCatalog, ResilientCatalog, TokenBucket};
use vitrine_core::CatalogRecord;
use vitrine_store::RecordStore;

use crate::config::SyncConfig;
use crate::error::{ConfigError, ReconciliationError, SyncResult};
use crate::feed::{FeedCache, FeedSource};
use crate::orchestrator::{SyncOrchestrator, SyncRunResult};
use crate::reconciliation::{DiscrepancyReport, ReconciliationAuditor, ReconciliationResult};

/// Sync and reconciliation entry points for a host application.
pub struct CatalogSyncService {
    config: SyncConfig,
    orchestrator: Arc<SyncOrchestrator>,
    auditor: ReconciliationAuditor,
    feed: Arc<FeedCache>,
}

impl CatalogSyncService {
    /// Validate `config` and assemble the engine.
    pub fn new(
        catalog: Arc<dyn FullCatalog>,
        store: Arc<dyn RecordStore>,
        feed: Arc<dyn FeedSource>,
        config: SyncConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_cancellation(catalog, store, feed, config, CancellationToken::new())
    }

    /// Like [`CatalogSyncService::new`], observing an external cancellation token.
    pub fn with_cancellation(
        catalog: Arc<dyn FullCatalog>,
        store: Arc<dyn RecordStore>,
        feed: Arc<dyn FeedSource>,
        config: SyncConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut resilient = ResilientCatalog::new(catalog, config.retry.to_retry_config());
        if let Some(rate) = config.rate_limit_per_second {
            resilient = resilient.with_rate_limiter(Arc::new(TokenBucket::per_second(rate)));
        }
        let catalog: Arc<dyn FullCatalog> = Arc::new(resilient);

        let orchestrator =
            Arc::new(SyncOrchestrator::new(catalog, store, &config).with_cancellation(cancel));
        let feed = Arc::new(FeedCache::new(feed, config.feed_cache_ttl()));
        let auditor = ReconciliationAuditor::new(
            Arc::clone(&orchestrator),
            Arc::clone(&feed) as Arc<dyn FeedSource>,
            config.reconciliation.clone(),
        );

        info!(
            max_concurrency = config.max_concurrency,
            dry_run = config.dry_run,
            rate_limit_per_second = ?config.rate_limit_per_second,
            primary_location = %config.inventory.primary_location,
            "Catalog sync service initialized"
        );

        Ok(Self {
            config,
            orchestrator,
            auditor,
            feed,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    pub fn feed_cache(&self) -> &Arc<FeedCache> {
        &self.feed
    }

    /// Token that stops a running sync between records.
    pub fn cancellation_token(&self) -> &CancellationToken {
        self.orchestrator.cancellation_token()
    }

    /// Sync an explicit batch of records.
    pub async fn sync(&self, records: &[CatalogRecord]) -> SyncResult<SyncRunResult> {
        self.orchestrator.sync(records).await
    }

    /// Sync the current feed snapshot, served from cache when fresh.
    #[instrument(skip(self))]
    pub async fn sync_from_feed(&self) -> SyncResult<SyncRunResult> {
        let records = self.feed.get().await?;
        self.orchestrator.sync(&records).await
    }

    /// Report drift between feed, store and remote catalog.
    pub async fn analyze_discrepancies(&self) -> Result<DiscrepancyReport, ReconciliationError> {
        self.auditor.analyze().await
    }

    /// Repair drift. See [`ReconciliationAuditor::repair`].
    pub async fn perform_reconciliation(
        &self,
        force: bool,
    ) -> Result<ReconciliationResult, ReconciliationError> {
        self.auditor.repair(force).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::StaticFeed;
    use vitrine_catalog::InMemoryCatalog;
    use vitrine_store::InMemoryRecordStore;

    fn service(config: SyncConfig, feed: Arc<StaticFeed>) -> Result<CatalogSyncService, ConfigError> {
        CatalogSyncService::new(
            Arc::new(InMemoryCatalog::new()),
            Arc::new(InMemoryRecordStore::new()),
            feed,
            config,
        )
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = SyncConfig::default();
        config.max_concurrency = 0;
        assert!(service(config, Arc::new(StaticFeed::default())).is_err());
    }

    #[tokio::test]
    async fn test_sync_from_feed_uses_cache() {
        let feed = Arc::new(StaticFeed::new(vec![CatalogRecord::new("A")]));
        let service = service(SyncConfig::default(), feed.clone()).unwrap();

        let first = service.sync_from_feed().await.unwrap();
        assert_eq!(first.created, 1);
        let second = service.sync_from_feed().await.unwrap();
        assert_eq!(second.skipped, 1);
        assert_eq!(feed.load_count(), 1);

        let report = service.analyze_discrepancies().await.unwrap();
        assert!(report.is_clean());
    }
}
