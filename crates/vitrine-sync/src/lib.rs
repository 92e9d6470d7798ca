//! vitrine Sync Engine
//!
//! Keeps a remote e-commerce catalog consistent with an authoritative
//! inventory feed, using a local record store as the memory of what has
//! been published.
//!
//! # Components
//!
//! - [`ChangeDetector`] - partitions a feed snapshot against the store
//! - [`InventoryPolicy`] - single-unit stock levels, absolute writes only
//! - [`VariantOptionPlanner`] - option edits that keep one variant per entry
//! - [`CollectionAssigner`] - rule-based collection memberships
//! - [`SyncOrchestrator`] - drives publish, update and retire per record
//! - [`ReconciliationAuditor`] - three-way drift report and bounded repair
//! - [`CatalogSyncService`] - wires everything behind retries, rate limiting
//!   and a feed cache
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vitrine_catalog::InMemoryCatalog;
//! use vitrine_core::CatalogRecord;
//! use vitrine_store::InMemoryRecordStore;
//! use vitrine_sync::{CatalogSyncService, StaticFeed, SyncConfig};
//!
//! # tokio_test_block(async {
//! let service = CatalogSyncService::new(
//!     Arc::new(InMemoryCatalog::new()),
//!     Arc::new(InMemoryRecordStore::new()),
//!     Arc::new(StaticFeed::new(vec![CatalogRecord::new("T-1001")])),
//!     SyncConfig::default(),
//! )
//! .unwrap();
//!
//! let result = service.sync_from_feed().await.unwrap();
//! assert_eq!(result.created, 1);
//! assert!(result.is_success());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod change;
pub mod collections;
pub mod config;
pub mod draft;
pub mod error;
pub mod feed;
pub mod inventory;
pub mod logging;
pub mod options;
pub mod orchestrator;
pub mod reconciliation;
pub mod service;

pub use change::{
    ChangeDetector, ChangeRecord, ChangeSet, RejectReason, RejectedRecord, COMPARISON_FIELDS,
};
pub use collections::{CollectionAssigner, CollectionMapping, MembershipDiff, PriceBand};
pub use config::{InventorySettings, ReconciliationSettings, RetrySettings, SyncConfig};
pub use error::{
    ConfigError, ErrorKind, FeedError, FeedResult, ReconciliationError, RecordError, SyncError,
    SyncResult,
};
pub use feed::{FeedCache, FeedSource, StaticFeed};
pub use inventory::{InventoryPolicy, InventoryWrite, IN_STOCK, OUT_OF_STOCK};
pub use options::{desired_axes, EditPlan, RecreateReason, VariantOptionPlanner};
pub use orchestrator::{PlannedAction, SyncAction, SyncOrchestrator, SyncOutcome, SyncRunResult};
pub use reconciliation::{
    DiscrepancyReport, DiscrepancyType, ReconciliationAuditor, ReconciliationResult,
    RemediationAction, RemediationResult, RunStatistics,
};
pub use service::CatalogSyncService;
