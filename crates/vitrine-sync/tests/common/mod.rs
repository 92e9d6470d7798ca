//! Common test utilities for vitrine-sync integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use vitrine_catalog::{
    CatalogError, CatalogResult, CollectionOps, EntryDraft, EntryOps, EntryPatch, InMemoryCatalog,
    InventoryOps, OptionAxis, OptionOps, RemoteCatalog, RemoteCatalogEntry,
};
use vitrine_core::{CatalogRecord, CollectionId, LocationId, RemoteEntryId, VariantId, STATUS_SOLD};
use vitrine_store::{InMemoryRecordStore, RecordStore};
use vitrine_sync::{
    CatalogSyncService, RetrySettings, StaticFeed, SyncConfig, SyncRunResult,
};

// =============================================================================
// Fault injection
// =============================================================================

/// Catalog decorator that fails calls with a transient error on demand.
pub struct FlakyCatalog {
    inner: Arc<InMemoryCatalog>,
    fail_next: AtomicUsize,
    failing_skus: RwLock<BTreeSet<String>>,
    refused_collections: RwLock<BTreeSet<CollectionId>>,
    lost_create_responses: AtomicUsize,
    injected: AtomicUsize,
}

impl FlakyCatalog {
    pub fn new(inner: Arc<InMemoryCatalog>) -> Self {
        Self {
            inner,
            fail_next: AtomicUsize::new(0),
            failing_skus: RwLock::new(BTreeSet::new()),
            refused_collections: RwLock::new(BTreeSet::new()),
            lost_create_responses: AtomicUsize::new(0),
            injected: AtomicUsize::new(0),
        }
    }

    /// Fail the next `count` calls, whatever the operation.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Fail every create for `sku` until [`FlakyCatalog::heal`].
    pub async fn fail_creates_for(&self, sku: &str) {
        self.failing_skus.write().await.insert(sku.to_string());
    }

    /// Apply the next `count` creates remotely, then report a network error.
    pub fn lose_create_responses(&self, count: usize) {
        self.lost_create_responses.store(count, Ordering::SeqCst);
    }

    /// Reject every membership addition to `collection_id`.
    pub async fn refuse_collection(&self, collection_id: &str) {
        self.refused_collections
            .write()
            .await
            .insert(CollectionId::new(collection_id));
    }

    pub async fn heal(&self) {
        self.fail_next.store(0, Ordering::SeqCst);
        self.lost_create_responses.store(0, Ordering::SeqCst);
        self.failing_skus.write().await.clear();
        self.refused_collections.write().await.clear();
    }

    /// Number of failures injected so far.
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    fn gate(&self) -> CatalogResult<()> {
        let tripped = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(CatalogError::network("injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCatalog for FlakyCatalog {
    fn display_name(&self) -> &str {
        "flaky catalog"
    }
}

#[async_trait]
impl EntryOps for FlakyCatalog {
    async fn create_entry(&self, draft: &EntryDraft) -> CatalogResult<RemoteCatalogEntry> {
        self.gate()?;
        if self.failing_skus.read().await.contains(&draft.sku) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(CatalogError::Unavailable {
                message: format!("create refused for {}", draft.sku),
            });
        }
        let created = self.inner.create_entry(draft).await?;
        let lost = self
            .lost_create_responses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(CatalogError::network("connection reset after create"));
        }
        Ok(created)
    }

    async fn update_entry(
        &self,
        id: &RemoteEntryId,
        patch: &EntryPatch,
    ) -> CatalogResult<RemoteCatalogEntry> {
        self.gate()?;
        self.inner.update_entry(id, patch).await
    }

    async fn delete_entry(&self, id: &RemoteEntryId) -> CatalogResult<()> {
        self.gate()?;
        self.inner.delete_entry(id).await
    }

    async fn get_entry(&self, id: &RemoteEntryId) -> CatalogResult<RemoteCatalogEntry> {
        self.gate()?;
        self.inner.get_entry(id).await
    }

    async fn list_all(&self) -> CatalogResult<Vec<RemoteCatalogEntry>> {
        self.gate()?;
        self.inner.list_all().await
    }

    async fn find_by_business_key(&self, sku: &str) -> CatalogResult<Option<RemoteCatalogEntry>> {
        self.gate()?;
        self.inner.find_by_business_key(sku).await
    }
}

#[async_trait]
impl OptionOps for FlakyCatalog {
    async fn create_options(
        &self,
        id: &RemoteEntryId,
        axes: &[OptionAxis],
    ) -> CatalogResult<RemoteCatalogEntry> {
        self.gate()?;
        self.inner.create_options(id, axes).await
    }

    async fn remove_options(&self, id: &RemoteEntryId) -> CatalogResult<RemoteCatalogEntry> {
        self.gate()?;
        self.inner.remove_options(id).await
    }

    async fn set_variant_option_values(
        &self,
        id: &RemoteEntryId,
        variant_id: &VariantId,
        values: &[String],
    ) -> CatalogResult<()> {
        self.gate()?;
        self.inner.set_variant_option_values(id, variant_id, values).await
    }
}

#[async_trait]
impl InventoryOps for FlakyCatalog {
    async fn set_inventory_level(
        &self,
        variant_id: &VariantId,
        location_id: &LocationId,
        level: i64,
    ) -> CatalogResult<()> {
        self.gate()?;
        self.inner
            .set_inventory_level(variant_id, location_id, level)
            .await
    }
}

#[async_trait]
impl CollectionOps for FlakyCatalog {
    async fn add_collection_membership(
        &self,
        entry_id: &RemoteEntryId,
        collection_id: &CollectionId,
    ) -> CatalogResult<()> {
        self.gate()?;
        if self.refused_collections.read().await.contains(collection_id) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(CatalogError::invalid_data(format!(
                "collection {collection_id} refused the entry"
            )));
        }
        self.inner
            .add_collection_membership(entry_id, collection_id)
            .await
    }

    async fn remove_collection_membership(
        &self,
        entry_id: &RemoteEntryId,
        collection_id: &CollectionId,
    ) -> CatalogResult<()> {
        self.gate()?;
        self.inner
            .remove_collection_membership(entry_id, collection_id)
            .await
    }

    async fn list_collection_memberships(
        &self,
        entry_id: &RemoteEntryId,
    ) -> CatalogResult<Vec<CollectionId>> {
        self.gate()?;
        self.inner.list_collection_memberships(entry_id).await
    }
}

// =============================================================================
// Fixture
// =============================================================================

/// Clean remote catalog, clean store and an engine wired over both.
pub struct SyncFixture {
    pub catalog: Arc<InMemoryCatalog>,
    pub flaky: Arc<FlakyCatalog>,
    pub store: Arc<InMemoryRecordStore>,
    pub feed: Arc<StaticFeed>,
    pub service: CatalogSyncService,
}

/// Fast retries without jitter.
pub fn test_config() -> SyncConfig {
    SyncConfig {
        retry: RetrySettings {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..SyncConfig::default()
    }
}

impl SyncFixture {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        vitrine_sync::logging::init_test_logging();
        let catalog = Arc::new(InMemoryCatalog::new());
        let flaky = Arc::new(FlakyCatalog::new(catalog.clone()));
        let store = Arc::new(InMemoryRecordStore::new());
        let feed = Arc::new(StaticFeed::default());
        let service = CatalogSyncService::new(flaky.clone(), store.clone(), feed.clone(), config)
            .expect("valid test config");
        Self {
            catalog,
            flaky,
            store,
            feed,
            service,
        }
    }

    /// Publish `records` as the feed snapshot and sync it.
    pub async fn sync(&self, records: &[CatalogRecord]) -> SyncRunResult {
        self.set_feed(records).await;
        self.service.sync(records).await.expect("sync run")
    }

    /// Replace the feed snapshot, dropping any cached copy.
    pub async fn set_feed(&self, records: &[CatalogRecord]) {
        self.feed.replace(records.to_vec()).await;
        self.service.feed_cache().clear().await;
    }

    pub async fn remote_entries(&self) -> Vec<RemoteCatalogEntry> {
        self.catalog.list_all().await.expect("list remote entries")
    }

    pub async fn remote_by_sku(&self, sku: &str) -> RemoteCatalogEntry {
        self.catalog
            .find_by_business_key(sku)
            .await
            .expect("lookup by sku")
            .unwrap_or_else(|| panic!("no remote entry for {sku}"))
    }

    pub async fn stored(&self, key: &str) -> Option<CatalogRecord> {
        self.store.find_by_key(key).await.expect("store lookup")
    }

    /// Check the catalog-wide invariants against the store.
    pub async fn assert_invariants(&self) {
        let entries = self.remote_entries().await;
        let mut skus = BTreeMap::new();
        for entry in &entries {
            assert_eq!(
                entry.variant_count(),
                1,
                "entry {} has {} variants",
                entry.sku,
                entry.variant_count()
            );
            let inventory = entry.total_inventory();
            assert!(
                (0..=1).contains(&inventory),
                "entry {} has inventory {inventory}",
                entry.sku
            );
            if let Some(record) = self.stored(&entry.sku).await {
                let expected = if record.is_sold() { 0 } else { 1 };
                assert_eq!(inventory, expected, "inventory of {}", entry.sku);
            }
            *skus.entry(entry.sku.clone()).or_insert(0) += 1;
        }
        for (sku, count) in skus {
            assert_eq!(count, 1, "business key {sku} has {count} remote entries");
        }
    }
}

// =============================================================================
// Record builders
// =============================================================================

/// An available watch with all three option attributes set.
pub fn watch(key: &str) -> CatalogRecord {
    let mut record = CatalogRecord::new(key);
    record.description = Some(format!("Pre-owned watch {key}"));
    record.designer = Some("Omega".to_string());
    record.model = Some("Seamaster".to_string());
    record.year = Some("2019".to_string());
    record.dial = Some("Blue".to_string());
    record.diameter = Some("40mm".to_string());
    record.material = Some("Steel".to_string());
    record.image_urls = vec![
        format!("https://img.example.com/{key}/1.jpg"),
        format!("https://img.example.com/{key}/2.jpg"),
    ];
    record.price = Some(Decimal::new(4_250, 0));
    record
}

pub fn watch_with_options(key: &str, dial: &str, diameter: &str, material: &str) -> CatalogRecord {
    let mut record = watch(key);
    record.dial = Some(dial.to_string());
    record.diameter = Some(diameter.to_string());
    record.material = Some(material.to_string());
    record
}

pub fn sold_watch(key: &str) -> CatalogRecord {
    watch(key).with_status(STATUS_SOLD)
}

/// `count` watches keyed `{prefix}-001`, `{prefix}-002`, ...
pub fn batch(prefix: &str, count: usize) -> Vec<CatalogRecord> {
    (1..=count)
        .map(|i| watch(&format!("{prefix}-{i:03}")))
        .collect()
}
