//! In-memory record store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use vitrine_core::{normalize_key, CatalogRecord, PublishStatus, RemoteEntryId};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ensure_remote_id_unchanged, RecordStore, RemoteIdCorrection};

/// Record store backed by a map, for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<BTreeMap<String, CatalogRecord>>,
    corrections: RwLock<Vec<RemoteIdCorrection>>,
    failing_saves: AtomicUsize,
    saves: AtomicUsize,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` saves fail with a write error.
    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Audited remote identifier corrections, oldest first.
    pub async fn corrections(&self) -> Vec<RemoteIdCorrection> {
        self.corrections.read().await.clone()
    }

    /// Insert a record as-is, bypassing the immutability check.
    pub async fn insert_raw(&self, record: CatalogRecord) {
        self.records
            .write()
            .await
            .insert(normalize_key(&record.tag_number), record);
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_all(&self) -> StoreResult<Vec<CatalogRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn find_by_key(&self, business_key: &str) -> StoreResult<Option<CatalogRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(&normalize_key(business_key))
            .cloned())
    }

    async fn save(&self, record: &CatalogRecord) -> StoreResult<CatalogRecord> {
        record.validate()?;

        let pending_failures = self.failing_saves.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.failing_saves
                .store(pending_failures - 1, Ordering::SeqCst);
            return Err(StoreError::WriteFailed(format!(
                "injected failure saving '{}'",
                record.business_key()
            )));
        }

        let key = normalize_key(&record.tag_number);
        let mut records = self.records.write().await;
        ensure_remote_id_unchanged(records.get(&key), record)?;

        let mut stored = record.clone();
        stored.tag_number = key.clone();
        records.insert(key, stored.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }

    async fn delete(&self, business_key: &str) -> StoreResult<bool> {
        Ok(self
            .records
            .write()
            .await
            .remove(&normalize_key(business_key))
            .is_some())
    }

    async fn delete_all(&self) -> StoreResult<u64> {
        let mut records = self.records.write().await;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }

    async fn correct_remote_id(
        &self,
        business_key: &str,
        remote_id: Option<&RemoteEntryId>,
        reason: &str,
    ) -> StoreResult<CatalogRecord> {
        let key = normalize_key(business_key);
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        let correction = RemoteIdCorrection {
            business_key: key.clone(),
            previous: record.remote_id.clone(),
            new: remote_id.cloned(),
            reason: reason.to_string(),
            corrected_at: Utc::now(),
        };

        record.remote_id = remote_id.cloned();
        record.publish_status = if record.remote_id.is_some() {
            PublishStatus::Published
        } else {
            PublishStatus::Pending
        };
        let updated = record.clone();
        drop(records);

        info!(
            business_key = %key,
            previous = ?correction.previous,
            new = ?correction.new,
            reason,
            "Corrected remote id"
        );
        self.corrections.write().await.push(correction);
        Ok(updated)
    }
}
