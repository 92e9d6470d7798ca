//! vitrine Record Store
//!
//! Keyed persistence of catalog records and their remote identifiers.
//!
//! - [`RecordStore`] - the store contract used by the sync engine
//! - [`PgRecordStore`] - PostgreSQL implementation (sqlx, tenant-scoped)
//! - [`InMemoryRecordStore`] - map-backed implementation for dry runs and tests
//!
//! Remote identifiers are write-once through [`RecordStore::save`]; changing
//! one requires [`RecordStore::correct_remote_id`], which is audited.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRecordStore;
pub use postgres::PgRecordStore;
pub use traits::{RecordStore, RemoteIdCorrection};
