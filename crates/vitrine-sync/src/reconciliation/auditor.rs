//! Three-way audit and bounded repair.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use vitrine_catalog::FullCatalog;
use vitrine_core::{normalize_key, CatalogRecord, RunId};
use vitrine_store::RecordStore;

use super::discrepancy::{analyze_snapshots, DiscrepancyReport};
use super::remediation::{BulkRemediationSummary, RemediationExecutor, RemediationResult};
use super::statistics::RunStatistics;
use crate::config::ReconciliationSettings;
use crate::error::ReconciliationError;
use crate::feed::FeedSource;
use crate::orchestrator::SyncOrchestrator;

/// Outcome of a repair run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub run_id: RunId,
    pub report: DiscrepancyReport,
    pub results: Vec<RemediationResult>,
    pub summary: BulkRemediationSummary,
    pub statistics: RunStatistics,
    /// Repair ran past the safety threshold.
    pub forced: bool,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ReconciliationResult {
    /// Failed actions, with business key and message.
    pub fn failures(&self) -> impl Iterator<Item = &RemediationResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.summary.failed == 0
    }
}

/// Compares feed, store and remote catalog, and repairs drift.
pub struct ReconciliationAuditor {
    catalog: Arc<dyn FullCatalog>,
    store: Arc<dyn RecordStore>,
    feed: Arc<dyn FeedSource>,
    orchestrator: Arc<SyncOrchestrator>,
    settings: ReconciliationSettings,
}

impl ReconciliationAuditor {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        feed: Arc<dyn FeedSource>,
        settings: ReconciliationSettings,
    ) -> Self {
        Self {
            catalog: Arc::clone(orchestrator.catalog()),
            store: Arc::clone(orchestrator.store()),
            feed,
            orchestrator,
            settings,
        }
    }

    pub fn settings(&self) -> &ReconciliationSettings {
        &self.settings
    }

    /// Load all three sources and report drift. Read-only.
    #[instrument(skip(self))]
    pub async fn analyze(&self) -> Result<DiscrepancyReport, ReconciliationError> {
        let (remote, stored, feed) = self.load_snapshots().await?;
        let report = analyze_snapshots(&feed, &stored, &remote, self.settings.max_deletion_ratio);
        info!(
            remote = report.remote_size,
            stored = report.store_size,
            feed = report.feed_size,
            discrepancies = report.total_discrepancies(),
            proposed_deletions = report.proposed_deletions,
            exceeds_safety_threshold = report.exceeds_safety_threshold,
            "Discrepancy analysis complete"
        );
        Ok(report)
    }

    async fn load_snapshots(
        &self,
    ) -> Result<
        (
            Vec<vitrine_catalog::RemoteCatalogEntry>,
            Vec<CatalogRecord>,
            Vec<CatalogRecord>,
        ),
        ReconciliationError,
    > {
        let remote = self.catalog.list_all().await?;
        let stored = self.store.find_all().await?;
        let feed = self.feed.load_fresh_snapshot().await?;
        Ok((remote, stored, feed))
    }

    /// Analyze, then repair.
    ///
    /// Refuses with [`ReconciliationError::SafetyThresholdExceeded`] when the
    /// proposed deletions exceed the configured share of the catalog, unless
    /// `force` is set. Actions run in order: id corrections, links, remote
    /// deletions, store cleanup, then re-syncs.
    #[instrument(skip(self))]
    pub async fn repair(&self, force: bool) -> Result<ReconciliationResult, ReconciliationError> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = RunId::new();

        let (remote, stored, feed) = self.load_snapshots().await?;
        let report = analyze_snapshots(&feed, &stored, &remote, self.settings.max_deletion_ratio);

        if report.exceeds_safety_threshold {
            if !force {
                error!(
                    run_id = %run_id,
                    proposed_deletions = report.proposed_deletions,
                    total_catalog_size = report.total_catalog_size,
                    max_ratio = self.settings.max_deletion_ratio,
                    "Repair refused: safety threshold exceeded"
                );
                return Err(ReconciliationError::SafetyThresholdExceeded {
                    proposed_deletions: report.proposed_deletions,
                    total_catalog_size: report.total_catalog_size,
                    max_ratio: self.settings.max_deletion_ratio,
                });
            }
            warn!(
                run_id = %run_id,
                proposed_deletions = report.proposed_deletions,
                total_catalog_size = report.total_catalog_size,
                "Safety threshold exceeded; repair forced"
            );
        }

        let feed_by_key = index_by_key(&feed);
        let stored_by_key = index_by_key(&stored);
        let executor =
            RemediationExecutor::new(Arc::clone(&self.orchestrator), self.settings.dry_run);
        let mut results = Vec::new();
        let mut resync: BTreeSet<String> = BTreeSet::new();

        for mismatch in &report.id_mismatches {
            let result = executor
                .execute_correct_remote_id(
                    &mismatch.business_key,
                    mismatch.stored_remote_id.as_ref(),
                    Some(&mismatch.remote_lookup_id),
                    "stored remote id disagrees with lookup by business key",
                )
                .await;
            if result.is_success() && feed_by_key.contains_key(mismatch.business_key.as_str()) {
                resync.insert(mismatch.business_key.clone());
            }
            results.push(result);
        }

        for extra in report.extra_in_remote.iter().filter(|e| e.in_feed) {
            let Some(record) = feed_by_key.get(extra.business_key.as_str()) else {
                continue;
            };
            let result = executor.execute_link(record, &extra.remote_id).await;
            if result.is_success() {
                resync.insert(extra.business_key.clone());
            }
            results.push(result);
        }

        for extra in report.extra_in_remote.iter().filter(|e| !e.in_feed) {
            results.push(
                executor
                    .execute_delete_remote(&extra.business_key, &extra.remote_id)
                    .await,
            );
        }
        for duplicate in &report.duplicate_keys {
            for remote_id in &duplicate.extras {
                results.push(
                    executor
                        .execute_delete_remote(&duplicate.business_key, remote_id)
                        .await,
                );
            }
        }

        for extra in &report.extra_in_store {
            let Some(record) = stored_by_key.get(extra.business_key.as_str()) else {
                continue;
            };
            if extra.in_feed {
                let result = executor
                    .execute_correct_remote_id(
                        &extra.business_key,
                        extra.remote_id.as_ref(),
                        None,
                        "remote entry no longer exists",
                    )
                    .await;
                if result.is_success() {
                    resync.insert(extra.business_key.clone());
                }
                results.push(result);
            } else {
                results.push(executor.execute_delete_store_row(record).await);
            }
        }

        resync.extend(
            report
                .image_count_mismatches
                .iter()
                .map(|m| m.business_key.clone()),
        );
        resync.extend(
            report
                .invariant_breaches
                .iter()
                .map(|b| b.business_key.clone()),
        );
        for key in &resync {
            let record = feed_by_key
                .get(key.as_str())
                .or_else(|| stored_by_key.get(key.as_str()));
            if let Some(record) = record {
                results.push(executor.execute_resync(record).await);
            }
        }

        let mut statistics = RunStatistics::from_report(&report);
        for result in &results {
            statistics.record_action(result);
        }
        statistics.duration_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);

        let summary = BulkRemediationSummary::from_results(&results);
        info!(
            run_id = %run_id,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            forced = force && report.exceeds_safety_threshold,
            dry_run = self.settings.dry_run,
            "Reconciliation repair complete"
        );

        Ok(ReconciliationResult {
            run_id,
            forced: force && report.exceeds_safety_threshold,
            dry_run: self.settings.dry_run,
            report,
            results,
            summary,
            statistics,
            started_at,
            completed_at: Utc::now(),
        })
    }
}

fn index_by_key(records: &[CatalogRecord]) -> BTreeMap<String, &CatalogRecord> {
    let mut index = BTreeMap::new();
    for record in records {
        let key = normalize_key(&record.tag_number);
        if !key.is_empty() {
            index.entry(key).or_insert(record);
        }
    }
    index
}
