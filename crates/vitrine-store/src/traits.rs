//! Store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vitrine_core::{CatalogRecord, RemoteEntryId};

use crate::error::{StoreError, StoreResult};

/// An audited change of a record's remote identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIdCorrection {
    pub business_key: String,
    pub previous: Option<RemoteEntryId>,
    pub new: Option<RemoteEntryId>,
    pub reason: String,
    pub corrected_at: DateTime<Utc>,
}

/// Keyed persistence of catalog records.
///
/// Records are keyed by their normalized business key. Once a record has a
/// remote identifier, [`RecordStore::save`] refuses to change or clear it;
/// [`RecordStore::correct_remote_id`] is the only path that may, and it
/// leaves an audit entry.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load every record, ordered by business key.
    async fn find_all(&self) -> StoreResult<Vec<CatalogRecord>>;

    /// Load one record.
    async fn find_by_key(&self, business_key: &str) -> StoreResult<Option<CatalogRecord>>;

    /// Insert or update a record.
    async fn save(&self, record: &CatalogRecord) -> StoreResult<CatalogRecord>;

    /// Delete a record. Returns whether a row was removed.
    async fn delete(&self, business_key: &str) -> StoreResult<bool>;

    /// Delete every record. Returns the number of rows removed.
    async fn delete_all(&self) -> StoreResult<u64>;

    /// Replace a record's remote identifier under an audited reason.
    async fn correct_remote_id(
        &self,
        business_key: &str,
        remote_id: Option<&RemoteEntryId>,
        reason: &str,
    ) -> StoreResult<CatalogRecord>;
}

/// Reject a save that would change an assigned remote identifier.
pub(crate) fn ensure_remote_id_unchanged(
    stored: Option<&CatalogRecord>,
    incoming: &CatalogRecord,
) -> StoreResult<()> {
    if let Some(stored) = stored {
        if stored.remote_id.is_some() && stored.remote_id != incoming.remote_id {
            return Err(StoreError::RemoteIdImmutable {
                business_key: incoming.business_key().to_string(),
                stored: stored.remote_id.clone(),
                attempted: incoming.remote_id.clone(),
            });
        }
    }
    Ok(())
}
