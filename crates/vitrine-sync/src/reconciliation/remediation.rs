//! Remediation action execution for reconciliation.
//!
//! Each executor method performs one repair and reports it as a
//! [`RemediationResult`]; failures are recorded, never raised, so one bad
//! entry cannot stop the rest of a repair.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};
use vitrine_catalog::FullCatalog;
use vitrine_core::{CatalogRecord, PublishStatus, RemoteEntryId};
use vitrine_store::RecordStore;

use crate::orchestrator::{SyncOrchestrator, SyncOutcome};

/// Repair action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    /// Delete a remote entry.
    DeleteRemote,
    /// Delete a store row.
    DeleteStoreRow,
    /// Replace a stored remote id through the audited path.
    CorrectRemoteId,
    /// Record an unreferenced remote entry against its feed record.
    Link,
    /// Push a record through the sync path again.
    Resync,
}

impl RemediationAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationAction::DeleteRemote => "delete_remote",
            RemediationAction::DeleteStoreRow => "delete_store_row",
            RemediationAction::CorrectRemoteId => "correct_remote_id",
            RemediationAction::Link => "link",
            RemediationAction::Resync => "resync",
        }
    }

    /// Whether the action removes data.
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        matches!(
            self,
            RemediationAction::DeleteRemote | RemediationAction::DeleteStoreRow
        )
    }
}

impl std::fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResult {
    Success,
    Failure,
}

/// Result of a remediation action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationResult {
    /// Action that was executed.
    pub action: RemediationAction,
    /// Business key the action concerns.
    pub business_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteEntryId>,
    pub result: ActionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_state: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_state: Option<JsonValue>,
    pub dry_run: bool,
    pub executed_at: DateTime<Utc>,
}

impl RemediationResult {
    /// Create a successful result.
    pub fn success(
        action: RemediationAction,
        business_key: impl Into<String>,
        remote_id: Option<RemoteEntryId>,
        dry_run: bool,
    ) -> Self {
        Self {
            action,
            business_key: business_key.into(),
            remote_id,
            result: ActionResult::Success,
            error_message: None,
            before_state: None,
            after_state: None,
            dry_run,
            executed_at: Utc::now(),
        }
    }

    /// Create a failure result.
    pub fn failure(
        action: RemediationAction,
        business_key: impl Into<String>,
        remote_id: Option<RemoteEntryId>,
        error: String,
        dry_run: bool,
    ) -> Self {
        Self {
            result: ActionResult::Failure,
            error_message: Some(error),
            ..Self::success(action, business_key, remote_id, dry_run)
        }
    }

    /// Add before state.
    #[must_use]
    pub fn with_before_state(mut self, state: JsonValue) -> Self {
        self.before_state = Some(state);
        self
    }

    /// Add after state.
    #[must_use]
    pub fn with_after_state(mut self, state: JsonValue) -> Self {
        self.after_state = Some(state);
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.result, ActionResult::Success)
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.result, ActionResult::Failure)
    }
}

/// Summary of a batch of remediation actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRemediationSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BulkRemediationSummary {
    #[must_use]
    pub fn from_results(results: &[RemediationResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }
}

/// Executes repair actions against the catalog and the store.
pub struct RemediationExecutor {
    catalog: Arc<dyn FullCatalog>,
    store: Arc<dyn RecordStore>,
    orchestrator: Arc<SyncOrchestrator>,
    dry_run: bool,
}

impl RemediationExecutor {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, dry_run: bool) -> Self {
        Self {
            catalog: Arc::clone(orchestrator.catalog()),
            store: Arc::clone(orchestrator.store()),
            orchestrator,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Delete a remote entry. An entry that is already gone counts as done.
    pub async fn execute_delete_remote(
        &self,
        business_key: &str,
        remote_id: &RemoteEntryId,
    ) -> RemediationResult {
        let action = RemediationAction::DeleteRemote;
        let before = json!({ "remote_id": remote_id, "sku": business_key });
        if self.dry_run {
            return RemediationResult::success(action, business_key, Some(remote_id.clone()), true)
                .with_before_state(before);
        }

        match self.catalog.delete_entry(remote_id).await {
            Ok(()) => {
                info!(business_key, remote_id = %remote_id, "Deleted unreferenced remote entry");
                RemediationResult::success(action, business_key, Some(remote_id.clone()), false)
                    .with_before_state(before)
            }
            Err(e) if e.is_not_found() => {
                warn!(business_key, remote_id = %remote_id, "Remote entry already gone");
                RemediationResult::success(action, business_key, Some(remote_id.clone()), false)
                    .with_before_state(before)
            }
            Err(e) => RemediationResult::failure(
                action,
                business_key,
                Some(remote_id.clone()),
                e.to_string(),
                false,
            )
            .with_before_state(before),
        }
    }

    /// Delete a store row.
    pub async fn execute_delete_store_row(&self, record: &CatalogRecord) -> RemediationResult {
        let action = RemediationAction::DeleteStoreRow;
        let key = record.business_key();
        let before = serde_json::to_value(record).unwrap_or(JsonValue::Null);
        if self.dry_run {
            return RemediationResult::success(action, key, record.remote_id.clone(), true)
                .with_before_state(before);
        }

        match self.store.delete(key).await {
            Ok(_) => {
                info!(business_key = %key, "Deleted orphaned store row");
                RemediationResult::success(action, key, record.remote_id.clone(), false)
                    .with_before_state(before)
            }
            Err(e) => RemediationResult::failure(
                action,
                key,
                record.remote_id.clone(),
                e.to_string(),
                false,
            )
            .with_before_state(before),
        }
    }

    /// Replace a stored remote id, leaving an audit entry.
    pub async fn execute_correct_remote_id(
        &self,
        business_key: &str,
        previous: Option<&RemoteEntryId>,
        corrected: Option<&RemoteEntryId>,
        reason: &str,
    ) -> RemediationResult {
        let action = RemediationAction::CorrectRemoteId;
        let before = json!({ "remote_id": previous });
        let after = json!({ "remote_id": corrected });
        if self.dry_run {
            return RemediationResult::success(action, business_key, corrected.cloned(), true)
                .with_before_state(before)
                .with_after_state(after);
        }

        match self
            .store
            .correct_remote_id(business_key, corrected, reason)
            .await
        {
            Ok(_) => RemediationResult::success(action, business_key, corrected.cloned(), false)
                .with_before_state(before)
                .with_after_state(after),
            Err(e) => RemediationResult::failure(
                action,
                business_key,
                corrected.cloned(),
                e.to_string(),
                false,
            )
            .with_before_state(before),
        }
    }

    /// Store `record` as published under `remote_id`.
    pub async fn execute_link(
        &self,
        record: &CatalogRecord,
        remote_id: &RemoteEntryId,
    ) -> RemediationResult {
        let action = RemediationAction::Link;
        let key = record.business_key();
        let after = json!({ "remote_id": remote_id, "publish_status": PublishStatus::Published });
        if self.dry_run {
            return RemediationResult::success(action, key, Some(remote_id.clone()), true)
                .with_after_state(after);
        }

        let mut linked = record.clone();
        linked.tag_number = key.to_string();
        linked.remote_id = Some(remote_id.clone());
        linked.publish_status = PublishStatus::Published;

        match self.store.save(&linked).await {
            Ok(_) => {
                info!(business_key = %key, remote_id = %remote_id, "Linked remote entry to store");
                RemediationResult::success(action, key, Some(remote_id.clone()), false)
                    .with_after_state(after)
            }
            Err(e) => RemediationResult::failure(
                action,
                key,
                Some(remote_id.clone()),
                e.to_string(),
                false,
            ),
        }
    }

    /// Push `record` through the sync path.
    pub async fn execute_resync(&self, record: &CatalogRecord) -> RemediationResult {
        let action = RemediationAction::Resync;
        let key = record.business_key();
        if self.dry_run {
            return RemediationResult::success(action, key, record.remote_id.clone(), true);
        }

        match self.orchestrator.resync(record).await {
            Ok(outcome) => {
                let remote_id = match outcome {
                    SyncOutcome::Created(id) | SyncOutcome::Adopted(id) | SyncOutcome::Updated(id) => {
                        Some(id)
                    }
                    SyncOutcome::Retired | SyncOutcome::Skipped => None,
                };
                RemediationResult::success(action, key, remote_id, false)
            }
            Err(e) => RemediationResult::failure(
                action,
                key,
                record.remote_id.clone(),
                e.to_string(),
                false,
            ),
        }
    }
}
