//! Per-record sync state machine.
//!
//! A run reads one store snapshot, classifies the feed against it, and
//! drives each record through exactly one transition:
//!
//! | Classification              | Action  |
//! |-----------------------------|---------|
//! | new                         | publish |
//! | changed, has remote id      | update  |
//! | changed, no remote id       | publish |
//! | unchanged, has remote id    | skip    |
//! | unchanged, no remote id     | publish |
//! | deleted                     | retire  |
//!
//! The store row is written last, so a failed step leaves it as it was. A
//! failure is recorded against its record and never stops the batch.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use vitrine_catalog::{FullCatalog, OptionAxis, RemoteCatalogEntry};
use vitrine_core::{
    normalize_key, CatalogRecord, CollectionId, PublishStatus, RemoteEntryId, RunId, VariantId,
};
use vitrine_store::RecordStore;

use crate::change::{ChangeDetector, ChangeRecord, ChangeSet, RejectedRecord};
use crate::collections::{CollectionAssigner, MembershipDiff};
use crate::config::SyncConfig;
use crate::draft::{build_draft, build_patch};
use crate::error::{ErrorKind, RecordError, SyncError, SyncResult};
use crate::inventory::InventoryPolicy;
use crate::options::{desired_axes, VariantOptionPlanner};

/// Transition chosen for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Publish,
    Update,
    Skip,
    Retire,
    Reject,
}

impl SyncAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Publish => "publish",
            SyncAction::Update => "update",
            SyncAction::Skip => "skip",
            SyncAction::Retire => "retire",
            SyncAction::Reject => "reject",
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful transition did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new remote entry was created.
    Created(RemoteEntryId),
    /// An orphan remote entry with the same SKU was adopted.
    Adopted(RemoteEntryId),
    Updated(RemoteEntryId),
    Retired,
    Skipped,
}

/// One record's transition, as planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub business_key: String,
    pub action: SyncAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteEntryId>,
    /// Allowlisted fields that changed, for updates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_fields: Vec<String>,
}

/// Aggregate result of one sync run.
///
/// In a dry run the counters report what would have happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRunResult {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub dry_run: bool,
    pub cancelled: bool,
    /// Records that reached a terminal state: published, updated, retired,
    /// skipped, rejected or failed. Records left behind by cancellation are
    /// not counted.
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub failed: usize,
    pub errors: Vec<RecordError>,
    pub actions: Vec<PlannedAction>,
}

impl SyncRunResult {
    fn start(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id: RunId::new(),
            started_at: now,
            completed_at: now,
            dry_run,
            cancelled: false,
            processed: 0,
            created: 0,
            updated: 0,
            deleted: 0,
            skipped: 0,
            rejected: 0,
            failed: 0,
            errors: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Whether every record went through without error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors of one kind.
    pub fn errors_of(&self, kind: ErrorKind) -> impl Iterator<Item = &RecordError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    fn record_error(&mut self, business_key: &str, action: SyncAction, error: &SyncError) {
        let record_error = RecordError::new(business_key, action, error);
        match record_error.kind {
            ErrorKind::InvariantViolation => error!(
                business_key,
                action = %action,
                code = %record_error.code,
                error = %error,
                "Record left in violation of catalog invariants"
            ),
            _ => warn!(
                business_key,
                action = %action,
                kind = %record_error.kind,
                error = %error,
                "Record sync failed"
            ),
        }
        self.errors.push(record_error);
    }
}

/// A unit of work for one record.
#[derive(Debug, Clone)]
enum Work {
    Publish {
        incoming: CatalogRecord,
        stored: Option<CatalogRecord>,
    },
    Update(ChangeRecord),
    Retire(CatalogRecord),
}

impl Work {
    fn business_key(&self) -> &str {
        match self {
            Work::Publish { incoming, .. } => incoming.business_key(),
            Work::Update(change) => change.business_key(),
            Work::Retire(stored) => stored.business_key(),
        }
    }

    fn action(&self) -> SyncAction {
        match self {
            Work::Publish { .. } => SyncAction::Publish,
            Work::Update(_) => SyncAction::Update,
            Work::Retire(_) => SyncAction::Retire,
        }
    }

    fn planned(&self) -> PlannedAction {
        let (remote_id, changed_fields) = match self {
            Work::Publish { .. } => (None, Vec::new()),
            Work::Update(change) => (
                change.stored.remote_id.clone(),
                change.changed_fields.iter().map(|f| (*f).to_string()).collect(),
            ),
            Work::Retire(stored) => (stored.remote_id.clone(), Vec::new()),
        };
        PlannedAction {
            business_key: self.business_key().to_string(),
            action: self.action(),
            remote_id,
            changed_fields,
        }
    }
}

/// Target state of an entry derived from its record.
struct DesiredShape {
    axes: Vec<OptionAxis>,
    level: i64,
    collections: BTreeSet<CollectionId>,
}

/// Sequences detection, planning and remote mutation for a batch.
pub struct SyncOrchestrator {
    catalog: Arc<dyn FullCatalog>,
    store: Arc<dyn RecordStore>,
    detector: ChangeDetector,
    planner: VariantOptionPlanner,
    inventory: InventoryPolicy,
    collections: CollectionAssigner,
    max_concurrency: usize,
    dry_run: bool,
    verify_after_mutation: bool,
    cancel: CancellationToken,
}

impl SyncOrchestrator {
    pub fn new(
        catalog: Arc<dyn FullCatalog>,
        store: Arc<dyn RecordStore>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            detector: ChangeDetector::new(),
            planner: VariantOptionPlanner::new(),
            inventory: InventoryPolicy::new(config.inventory.primary_location.clone()),
            collections: CollectionAssigner::new(config.collections.clone()),
            max_concurrency: config.max_concurrency.max(1),
            dry_run: config.dry_run,
            verify_after_mutation: config.verify_after_mutation,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop runs between records when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn catalog(&self) -> &Arc<dyn FullCatalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn inventory_policy(&self) -> &InventoryPolicy {
        &self.inventory
    }

    pub fn collection_assigner(&self) -> &CollectionAssigner {
        &self.collections
    }

    /// Synchronize one feed snapshot.
    ///
    /// Fails only if the store snapshot cannot be read; every per-record
    /// failure lands in [`SyncRunResult::errors`].
    #[instrument(skip(self, records), fields(records = records.len(), dry_run = self.dry_run))]
    pub async fn sync(&self, records: &[CatalogRecord]) -> SyncResult<SyncRunResult> {
        let mut result = SyncRunResult::start(self.dry_run);

        let stored = self.store.find_all().await?;
        let set = self.detector.classify(records, &stored);
        info!(
            run_id = %result.run_id,
            new = set.new.len(),
            changed = set.changed.len(),
            unchanged = set.unchanged.len(),
            deleted = set.deleted.len(),
            rejected = set.rejected.len() + set.excluded.len(),
            "Feed snapshot classified"
        );

        let work = self.plan_work(set, &mut result);

        if self.dry_run {
            for item in &work {
                result.actions.push(item.planned());
                result.processed += 1;
                match item.action() {
                    SyncAction::Publish => result.created += 1,
                    SyncAction::Update => result.updated += 1,
                    SyncAction::Retire => result.deleted += 1,
                    SyncAction::Skip | SyncAction::Reject => {}
                }
            }
            result.completed_at = Utc::now();
            info!(run_id = %result.run_id, planned = work.len(), "Dry run complete");
            return Ok(result);
        }

        let outcomes: Vec<(PlannedAction, Option<SyncResult<SyncOutcome>>)> =
            if self.max_concurrency <= 1 {
                let mut outcomes = Vec::with_capacity(work.len());
                for item in work {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    let planned = item.planned();
                    outcomes.push((planned, Some(self.process(item).await)));
                }
                outcomes
            } else {
                stream::iter(work)
                    .map(|item| async move {
                        let planned = item.planned();
                        if self.cancel.is_cancelled() {
                            return (planned, None);
                        }
                        (planned, Some(self.process(item).await))
                    })
                    .buffer_unordered(self.max_concurrency)
                    .collect()
                    .await
            };

        for (planned, outcome) in outcomes {
            let Some(outcome) = outcome else {
                continue;
            };
            result.processed += 1;
            match outcome {
                Ok(SyncOutcome::Created(_)) | Ok(SyncOutcome::Adopted(_)) => result.created += 1,
                Ok(SyncOutcome::Updated(_)) => result.updated += 1,
                Ok(SyncOutcome::Retired) => result.deleted += 1,
                Ok(SyncOutcome::Skipped) => result.skipped += 1,
                Err(e) => {
                    result.failed += 1;
                    result.record_error(&planned.business_key, planned.action, &e);
                }
            }
            result.actions.push(planned);
        }

        result.cancelled = self.cancel.is_cancelled();
        result.completed_at = Utc::now();
        info!(
            run_id = %result.run_id,
            processed = result.processed,
            created = result.created,
            updated = result.updated,
            deleted = result.deleted,
            skipped = result.skipped,
            rejected = result.rejected,
            failed = result.failed,
            cancelled = result.cancelled,
            "Sync run complete"
        );
        Ok(result)
    }

    /// Route each classified record to its transition.
    fn plan_work(&self, set: ChangeSet, result: &mut SyncRunResult) -> Vec<Work> {
        for RejectedRecord { record, reason } in set.excluded.iter().chain(&set.rejected) {
            let key = record.business_key();
            result.processed += 1;
            result.rejected += 1;
            result.record_error(key, SyncAction::Reject, &reason.to_error(key));
            result.actions.push(PlannedAction {
                business_key: key.to_string(),
                action: SyncAction::Reject,
                remote_id: None,
                changed_fields: Vec::new(),
            });
        }

        let mut work = Vec::new();
        work.extend(set.new.into_iter().map(|incoming| Work::Publish {
            incoming,
            stored: None,
        }));
        for change in set.changed {
            if change.stored.is_published() {
                work.push(Work::Update(change));
            } else {
                work.push(Work::Publish {
                    incoming: change.incoming,
                    stored: Some(change.stored),
                });
            }
        }
        for change in set.unchanged {
            if change.stored.is_published() {
                debug!(business_key = %change.business_key(), "Unchanged, skipping");
                result.processed += 1;
                result.skipped += 1;
                result.actions.push(PlannedAction {
                    business_key: change.business_key().to_string(),
                    action: SyncAction::Skip,
                    remote_id: change.stored.remote_id.clone(),
                    changed_fields: Vec::new(),
                });
            } else {
                debug!(business_key = %change.business_key(), "Unchanged but never published");
                work.push(Work::Publish {
                    incoming: change.incoming,
                    stored: Some(change.stored),
                });
            }
        }
        work.extend(set.deleted.into_iter().map(Work::Retire));
        work
    }

    async fn process(&self, work: Work) -> SyncResult<SyncOutcome> {
        match work {
            Work::Publish { incoming, stored } => self.publish(&incoming, stored.as_ref()).await,
            Work::Update(change) => self.update(&change.stored, &change.incoming).await,
            Work::Retire(stored) => self.retire(&stored).await,
        }
    }

    /// Push one record through the update or publish path regardless of
    /// whether it changed.
    #[instrument(skip(self, record), fields(business_key = %record.business_key()))]
    pub async fn resync(&self, record: &CatalogRecord) -> SyncResult<SyncOutcome> {
        record.validate()?;
        let mut incoming = record.clone();
        incoming.tag_number = incoming.business_key().to_string();

        let stored = self.store.find_by_key(incoming.business_key()).await?;
        match stored {
            Some(stored) if stored.is_published() => self.update(&stored, &incoming).await,
            stored => self.publish(&incoming, stored.as_ref()).await,
        }
    }

    fn desired_shape(&self, record: &CatalogRecord) -> DesiredShape {
        DesiredShape {
            axes: desired_axes(record),
            level: InventoryPolicy::target_level(&record.status),
            collections: self.collections.desired_memberships(record),
        }
    }

    async fn publish(
        &self,
        incoming: &CatalogRecord,
        stored: Option<&CatalogRecord>,
    ) -> SyncResult<SyncOutcome> {
        let key = incoming.business_key();
        if let Some(remote_id) = stored.and_then(|s| s.remote_id.as_ref()) {
            return Err(SyncError::invariant(
                key,
                format!("publish requested for a record already linked to {remote_id}"),
            ));
        }
        let shape = self.desired_shape(incoming);

        let (entry, adopted) = match self.catalog.find_by_business_key(key).await? {
            Some(existing) => {
                warn!(
                    business_key = %key,
                    entry_id = %existing.id,
                    "Adopting existing remote entry with matching SKU"
                );
                let patch = build_patch(incoming, &existing);
                let entry = if patch.is_empty() {
                    existing
                } else {
                    self.catalog.update_entry(&existing.id, &patch).await?
                };
                (entry, true)
            }
            None => {
                let entry = self.catalog.create_entry(&build_draft(incoming)).await?;
                info!(business_key = %key, entry_id = %entry.id, "Created remote entry");
                (entry, false)
            }
        };

        let entry_id = entry.id.clone();
        let full_diff = adopted;
        self.converge(key, entry, &shape, full_diff).await?;

        let mut record = incoming.clone();
        record.remote_id = Some(entry_id.clone());
        record.publish_status = PublishStatus::Published;
        record.last_synced_at = Some(Utc::now());
        self.store.save(&record).await?;

        info!(business_key = %key, remote_id = %entry_id, adopted, "Published record");
        Ok(if adopted {
            SyncOutcome::Adopted(entry_id)
        } else {
            SyncOutcome::Created(entry_id)
        })
    }

    async fn update(
        &self,
        stored: &CatalogRecord,
        incoming: &CatalogRecord,
    ) -> SyncResult<SyncOutcome> {
        let key = incoming.business_key();
        let Some(remote_id) = stored.remote_id.clone() else {
            return Err(SyncError::invariant(key, "update requested for an unlinked record"));
        };
        let shape = self.desired_shape(incoming);

        let entry = match self.catalog.get_entry(&remote_id).await {
            Ok(entry) => entry,
            Err(e) if e.is_not_found() => {
                return Err(SyncError::RemoteEntryMissing {
                    business_key: key.to_string(),
                    remote_id,
                })
            }
            Err(e) => return Err(e.into()),
        };
        if normalize_key(&entry.sku) != key {
            return Err(SyncError::invariant(
                key,
                format!("stored remote id {remote_id} belongs to SKU '{}'", entry.sku),
            ));
        }

        let patch = build_patch(incoming, &entry);
        let entry = if patch.is_empty() {
            entry
        } else {
            debug!(business_key = %key, remote_id = %remote_id, "Patching scalar fields");
            self.catalog.update_entry(&remote_id, &patch).await?
        };

        self.converge(key, entry, &shape, true).await?;

        let mut record = incoming.clone();
        record.remote_id = Some(remote_id.clone());
        record.publish_status = PublishStatus::Published;
        record.last_synced_at = Some(Utc::now());
        self.store.save(&record).await?;

        info!(business_key = %key, remote_id = %remote_id, "Updated record");
        Ok(SyncOutcome::Updated(remote_id))
    }

    async fn retire(&self, stored: &CatalogRecord) -> SyncResult<SyncOutcome> {
        let key = stored.business_key();
        let remote_id = match &stored.remote_id {
            Some(id) => Some(id.clone()),
            None => self
                .catalog
                .find_by_business_key(key)
                .await?
                .map(|entry| entry.id),
        };

        if let Some(remote_id) = remote_id {
            match self.catalog.delete_entry(&remote_id).await {
                Ok(()) => info!(business_key = %key, remote_id = %remote_id, "Deleted remote entry"),
                Err(e) if e.is_not_found() => {
                    warn!(business_key = %key, remote_id = %remote_id, "Remote entry already gone")
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.store.delete(key).await?;
        info!(business_key = %key, "Retired record");
        Ok(SyncOutcome::Retired)
    }

    /// Bring options, stock and memberships of `entry` to `shape`, then
    /// verify the result.
    async fn converge(
        &self,
        key: &str,
        entry: RemoteCatalogEntry,
        shape: &DesiredShape,
        full_diff: bool,
    ) -> SyncResult<()> {
        let catalog = self.catalog.as_ref();
        let variant_id = entry
            .primary_variant()
            .map(|v| v.id.clone())
            .ok_or_else(|| SyncError::invariant(key, "entry has no variant"))?;

        let plan = self.planner.plan(&entry, &shape.axes);
        debug!(business_key = %key, plan = plan.label(), "Option plan chosen");
        let entry = self.planner.execute(catalog, &entry, &plan).await?;

        self.inventory
            .apply_absolute(catalog, &entry, shape.level)
            .await?;

        let current: BTreeSet<CollectionId> = catalog
            .list_collection_memberships(&entry.id)
            .await?
            .into_iter()
            .collect();
        let diff: MembershipDiff = if full_diff {
            CollectionAssigner::diff(&current, &shape.collections)
        } else {
            CollectionAssigner::add_only(&current, &shape.collections)
        };
        self.collections
            .apply(catalog, &entry.id, key, &diff)
            .await?;

        if self.verify_after_mutation {
            self.verify(key, &entry.id, &variant_id, shape).await?;
        }
        Ok(())
    }

    async fn verify(
        &self,
        key: &str,
        entry_id: &RemoteEntryId,
        variant_id: &VariantId,
        shape: &DesiredShape,
    ) -> SyncResult<()> {
        let fresh = self.catalog.get_entry(entry_id).await?;
        VariantOptionPlanner::verify_postcondition(&fresh, &shape.axes, variant_id)?;
        InventoryPolicy::check_invariant(&fresh, Some(shape.level))?;

        let memberships: BTreeSet<CollectionId> = self
            .catalog
            .list_collection_memberships(entry_id)
            .await?
            .into_iter()
            .collect();
        if memberships != shape.collections {
            error!(business_key = %key, entry_id = %entry_id, "Collection memberships out of shape");
            return Err(SyncError::PartialMembership {
                business_key: key.to_string(),
                message: format!(
                    "memberships {:?}, expected {:?}",
                    memberships, shape.collections
                ),
            });
        }
        Ok(())
    }
}
