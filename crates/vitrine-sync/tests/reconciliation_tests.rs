//! Reconciliation Auditor Tests
//!
//! Drift detection and repair across feed, store and remote catalog:
//! - orphaned remote entries (deleted or linked)
//! - store rows pointing at missing entries (deleted or republished)
//! - stored remote id disagreeing with the lookup by business key
//! - image count drift, duplicate business keys, broken stock invariants
//! - safety threshold, force and dry-run

mod common;

use common::{batch, test_config, watch, SyncFixture};
use vitrine_catalog::{EntryDraft, EntryOps};
use vitrine_core::{PublishStatus, RemoteEntryId};
use vitrine_sync::{
    DiscrepancyType, ReconciliationError, ReconciliationSettings, RemediationAction, SyncConfig,
};

fn permissive() -> SyncConfig {
    SyncConfig {
        reconciliation: ReconciliationSettings {
            max_deletion_ratio: 1.0,
            dry_run: false,
        },
        ..test_config()
    }
}

async fn orphan(fx: &SyncFixture, sku: &str) -> RemoteEntryId {
    fx.catalog
        .create_entry(&EntryDraft {
            title: format!("Orphan {sku}"),
            sku: sku.to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_synced_catalog_is_clean() {
    let fx = SyncFixture::new();
    fx.sync(&batch("CLEAN", 5)).await;
    fx.catalog.reset_counters().await;

    let report = fx.service.analyze_discrepancies().await.unwrap();

    assert!(report.is_clean(), "unexpected drift: {report:?}");
    assert_eq!(report.remote_size, 5);
    assert_eq!(report.store_size, 5);
    assert_eq!(report.feed_size, 5);
    assert_eq!(fx.catalog.mutation_count().await, 0);
}

#[tokio::test]
async fn test_orphan_outside_feed_is_deleted() {
    let fx = SyncFixture::with_config(permissive());
    fx.sync(&batch("KEEP", 2)).await;
    let orphan_id = orphan(&fx, "GONE-1").await;

    let report = fx.service.analyze_discrepancies().await.unwrap();
    assert_eq!(report.extra_in_remote.len(), 1);
    assert_eq!(report.extra_in_remote[0].remote_id, orphan_id);
    assert!(!report.extra_in_remote[0].in_feed);

    let result = fx.service.perform_reconciliation(false).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].action, RemediationAction::DeleteRemote);
    assert_eq!(fx.catalog.len().await, 2);
    assert_eq!(
        result
            .statistics
            .discrepancy_count(DiscrepancyType::ExtraInRemote),
        1
    );
    assert_eq!(result.statistics.action_count(RemediationAction::DeleteRemote), 1);
}

#[tokio::test]
async fn test_crash_window_orphan_is_linked_not_deleted() {
    let fx = SyncFixture::new();
    fx.store.fail_next_saves(1);
    let result = fx.sync(&[watch("CRASH-1")]).await;
    assert_eq!(result.failed, 1);

    let report = fx.service.analyze_discrepancies().await.unwrap();
    assert_eq!(report.extra_in_remote.len(), 1);
    assert!(report.extra_in_remote[0].in_feed);
    assert_eq!(report.proposed_deletions, 0);

    let result = fx.service.perform_reconciliation(false).await.unwrap();

    assert!(result.is_success());
    let entry = fx.remote_by_sku("CRASH-1").await;
    let stored = fx.stored("CRASH-1").await.unwrap();
    assert_eq!(stored.remote_id, Some(entry.id));
    assert_eq!(stored.publish_status, PublishStatus::Published);
    assert_eq!(fx.catalog.len().await, 1);
    assert!(fx.service.analyze_discrepancies().await.unwrap().is_clean());
}

#[tokio::test]
async fn test_store_row_outside_feed_is_deleted() {
    let fx = SyncFixture::with_config(permissive());
    let records = batch("ROW", 2);
    fx.sync(&records).await;
    let entry = fx.remote_by_sku("ROW-002").await;
    fx.catalog.remove_raw(&entry.id).await;
    fx.set_feed(&records[..1]).await;

    let report = fx.service.analyze_discrepancies().await.unwrap();
    assert_eq!(report.extra_in_store.len(), 1);
    assert!(!report.extra_in_store[0].in_feed);

    let result = fx.service.perform_reconciliation(false).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.results[0].action, RemediationAction::DeleteStoreRow);
    assert!(fx.stored("ROW-002").await.is_none());
}

#[tokio::test]
async fn test_store_row_in_feed_is_republished() {
    let fx = SyncFixture::new();
    fx.sync(&batch("REPUB", 3)).await;
    let lost = fx.remote_by_sku("REPUB-001").await;
    fx.catalog.remove_raw(&lost.id).await;

    let result = fx.service.perform_reconciliation(false).await.unwrap();

    assert!(result.is_success(), "failures: {:?}", result.failures().collect::<Vec<_>>());
    let actions: Vec<_> = result.results.iter().map(|r| r.action).collect();
    assert_eq!(
        actions,
        vec![RemediationAction::CorrectRemoteId, RemediationAction::Resync]
    );
    let entry = fx.remote_by_sku("REPUB-001").await;
    assert_ne!(entry.id, lost.id);
    assert_eq!(fx.stored("REPUB-001").await.unwrap().remote_id, Some(entry.id));
    assert_eq!(fx.store.corrections().await.len(), 1);
    fx.assert_invariants().await;
}

#[tokio::test]
async fn test_id_mismatch_is_corrected_with_audit() {
    let fx = SyncFixture::new();
    fx.sync(&[watch("MIS-1")]).await;
    let entry = fx.remote_by_sku("MIS-1").await;
    let mut stale = fx.stored("MIS-1").await.unwrap();
    stale.remote_id = Some(RemoteEntryId::new("gid://catalog/Product/999999"));
    fx.store.insert_raw(stale).await;

    let report = fx.service.analyze_discrepancies().await.unwrap();
    assert_eq!(report.id_mismatches.len(), 1);
    assert_eq!(report.id_mismatches[0].remote_lookup_id, entry.id);

    let result = fx.service.perform_reconciliation(false).await.unwrap();

    assert!(result.is_success());
    assert_eq!(fx.stored("MIS-1").await.unwrap().remote_id, Some(entry.id.clone()));
    let corrections = fx.store.corrections().await;
    assert_eq!(corrections.len(), 1);
    assert_eq!(
        corrections[0].previous,
        Some(RemoteEntryId::new("gid://catalog/Product/999999"))
    );
    assert_eq!(corrections[0].new, Some(entry.id));
    assert_eq!(fx.catalog.len().await, 1);
}

#[tokio::test]
async fn test_row_pointing_at_another_keys_entry_is_corrected() {
    let fx = SyncFixture::new();
    fx.sync(&[watch("XL-A"), watch("XL-B")]).await;
    let own = fx.remote_by_sku("XL-A").await;
    let other = fx.remote_by_sku("XL-B").await;
    let mut cross_linked = fx.stored("XL-A").await.unwrap();
    cross_linked.remote_id = Some(other.id.clone());
    fx.store.insert_raw(cross_linked).await;

    let report = fx.service.analyze_discrepancies().await.unwrap();
    assert_eq!(report.id_mismatches.len(), 1);
    assert_eq!(report.id_mismatches[0].business_key, "XL-A");
    assert_eq!(report.id_mismatches[0].stored_remote_id, Some(other.id.clone()));
    assert_eq!(report.id_mismatches[0].remote_lookup_id, own.id);
    assert!(report.extra_in_remote.is_empty());

    let result = fx.service.perform_reconciliation(false).await.unwrap();

    assert!(result.is_success(), "failures: {:?}", result.failures().collect::<Vec<_>>());
    assert_eq!(fx.stored("XL-A").await.unwrap().remote_id, Some(own.id.clone()));
    assert_eq!(fx.stored("XL-B").await.unwrap().remote_id, Some(other.id.clone()));
    assert_eq!(fx.catalog.get_entry(&other.id).await.unwrap(), other);
    assert_eq!(fx.store.corrections().await.len(), 1);
    assert!(fx.service.analyze_discrepancies().await.unwrap().is_clean());
}

#[tokio::test]
async fn test_repair_reads_the_live_feed_not_the_cache() {
    let fx = SyncFixture::new();
    fx.set_feed(&[watch("LIVE-A")]).await;
    fx.service.sync_from_feed().await.unwrap();
    assert!(fx.service.feed_cache().is_cached().await);

    // The cached snapshot still holds only LIVE-A.
    fx.feed.replace(vec![watch("LIVE-A"), watch("LIVE-C")]).await;
    orphan(&fx, "LIVE-C").await;

    let result = fx.service.perform_reconciliation(false).await.unwrap();

    assert_eq!(result.report.feed_size, 2);
    assert_eq!(result.results[0].action, RemediationAction::Link);
    assert!(result.is_success());
    assert_eq!(fx.catalog.len().await, 2);
    assert!(fx.stored("LIVE-C").await.unwrap().is_published());
}

#[tokio::test]
async fn test_image_drift_triggers_resync() {
    let fx = SyncFixture::new();
    fx.sync(&[watch("IMG-1")]).await;
    let entry = fx.remote_by_sku("IMG-1").await;
    fx.catalog
        .edit_raw(&entry.id, |e| e.images.truncate(1))
        .await
        .unwrap();

    let report = fx.service.analyze_discrepancies().await.unwrap();
    assert_eq!(report.image_count_mismatches.len(), 1);
    assert_eq!(report.image_count_mismatches[0].expected, 2);
    assert_eq!(report.image_count_mismatches[0].actual, 1);

    let result = fx.service.perform_reconciliation(false).await.unwrap();

    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].action, RemediationAction::Resync);
    assert_eq!(fx.remote_by_sku("IMG-1").await.images.len(), 2);
}

#[tokio::test]
async fn test_duplicate_business_key_keeps_the_linked_entry() {
    let fx = SyncFixture::with_config(permissive());
    fx.sync(&[watch("TWIN-1")]).await;
    let canonical = fx.remote_by_sku("TWIN-1").await.id;
    let twin = orphan(&fx, "TWIN-1").await;

    let report = fx.service.analyze_discrepancies().await.unwrap();
    assert_eq!(report.duplicate_keys.len(), 1);
    assert_eq!(report.duplicate_keys[0].canonical, canonical);
    assert_eq!(report.duplicate_keys[0].extras, vec![twin]);

    fx.service.perform_reconciliation(false).await.unwrap();

    assert_eq!(fx.catalog.len().await, 1);
    assert_eq!(fx.remote_by_sku("TWIN-1").await.id, canonical);
    fx.assert_invariants().await;
}

#[tokio::test]
async fn test_stock_breach_is_repaired() {
    let fx = SyncFixture::new();
    fx.sync(&[watch("STOCK-1")]).await;
    let entry = fx.remote_by_sku("STOCK-1").await;
    fx.catalog
        .edit_raw(&entry.id, |e| {
            for level in e.variants[0].inventory.values_mut() {
                *level = 2;
            }
        })
        .await
        .unwrap();

    let report = fx.service.analyze_discrepancies().await.unwrap();
    assert_eq!(report.invariant_breaches.len(), 1);

    let result = fx.service.perform_reconciliation(false).await.unwrap();

    assert!(result.is_success());
    assert_eq!(fx.remote_by_sku("STOCK-1").await.total_inventory(), 1);
    fx.assert_invariants().await;
}

#[tokio::test]
async fn test_mass_deletion_requires_force() {
    let fx = SyncFixture::new();
    fx.sync(&batch("REAL", 2)).await;
    for i in 0..8 {
        orphan(&fx, &format!("STRAY-{i}")).await;
    }

    let err = fx.service.perform_reconciliation(false).await.unwrap_err();

    match err {
        ReconciliationError::SafetyThresholdExceeded {
            proposed_deletions,
            total_catalog_size,
            ..
        } => {
            assert_eq!(proposed_deletions, 8);
            assert_eq!(total_catalog_size, 10);
        }
        other => panic!("expected safety threshold error, got {other:?}"),
    }
    assert_eq!(fx.catalog.len().await, 10);

    let result = fx.service.perform_reconciliation(true).await.unwrap();

    assert!(result.forced);
    assert_eq!(result.summary.succeeded, 8);
    assert_eq!(fx.catalog.len().await, 2);
}

#[tokio::test]
async fn test_dry_run_repair_only_reports() {
    let fx = SyncFixture::with_config(SyncConfig {
        reconciliation: ReconciliationSettings {
            max_deletion_ratio: 1.0,
            dry_run: true,
        },
        ..test_config()
    });
    fx.sync(&[watch("DRY-1")]).await;
    orphan(&fx, "DRY-ORPHAN").await;
    fx.catalog.reset_counters().await;

    let result = fx.service.perform_reconciliation(false).await.unwrap();

    assert!(result.dry_run);
    assert_eq!(result.summary.total, 1);
    assert!(result.results.iter().all(|r| r.dry_run));
    assert_eq!(fx.catalog.mutation_count().await, 0);
    assert_eq!(fx.catalog.len().await, 2);
}

#[tokio::test]
async fn test_repair_converges() {
    let fx = SyncFixture::with_config(permissive());
    let records = batch("CONV", 4);
    fx.sync(&records).await;
    orphan(&fx, "CONV-STRAY").await;
    let lost = fx.remote_by_sku("CONV-002").await;
    fx.catalog.remove_raw(&lost.id).await;

    let first = fx.service.perform_reconciliation(false).await.unwrap();
    assert!(first.is_success());

    let second = fx.service.perform_reconciliation(false).await.unwrap();
    assert!(second.report.is_clean());
    assert_eq!(second.summary.total, 0);
    fx.assert_invariants().await;
}
