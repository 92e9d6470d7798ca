//! # Reconciliation
//!
//! Out-of-band comparison of the feed, the record store and the remote
//! catalog, with bounded repair.
//!
//! ## Overview
//!
//! - Discrepancy detection (extra in remote, extra in store, id mismatch,
//!   image count mismatch, duplicate key, invariant breach)
//! - Remediation actions (delete remote, delete store row, correct remote id,
//!   link, resync)
//! - Safety threshold on proposed deletions, overridable with `force`
//! - Dry-run mode for previewing repairs
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  ReconciliationAuditor                   │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  feed ──┐                                                │
//! │  store ─┼─► analyze_snapshots ─► DiscrepancyReport       │
//! │  remote ┘                              │                 │
//! │                                        ▼                 │
//! │                    safety threshold ─► RemediationExecutor│
//! │                                        │                 │
//! │                                        ▼                 │
//! │                               RunStatistics / summary    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use vitrine_sync::reconciliation::ReconciliationAuditor;
//!
//! let auditor = ReconciliationAuditor::new(orchestrator, feed, settings);
//!
//! let report = auditor.analyze().await?;
//! if !report.is_clean() {
//!     let result = auditor.repair(false).await?;
//!     for failure in result.failures() {
//!         eprintln!("{}: {:?}", failure.business_key, failure.error_message);
//!     }
//! }
//! ```

pub mod auditor;
pub mod discrepancy;
pub mod remediation;
pub mod statistics;

pub use auditor::{ReconciliationAuditor, ReconciliationResult};
pub use discrepancy::{
    analyze_snapshots, DiscrepancyReport, DiscrepancyType, DuplicateKey, ExtraRemote, ExtraStore,
    IdMismatch, ImageCountMismatch, InvariantBreach,
};
pub use remediation::{
    ActionResult, BulkRemediationSummary, RemediationAction, RemediationExecutor,
    RemediationResult,
};
pub use statistics::RunStatistics;
