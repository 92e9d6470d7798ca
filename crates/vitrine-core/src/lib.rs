//! vitrine Core Library
//!
//! Shared types for the vitrine catalog sync engine.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (TenantId, RemoteEntryId, VariantId, ...)
//! - [`record`] - The canonical inventory record (`CatalogRecord`)
//! - [`error`] - Record validation errors (`CoreError`)
//!
//! # Example
//!
//! ```
//! use vitrine_core::{CatalogRecord, RemoteEntryId};
//!
//! let mut record = CatalogRecord::new("T-1001");
//! record.designer = Some("Rolex".to_string());
//! record.status = "AVAILABLE".to_string();
//!
//! assert!(record.validate().is_ok());
//! assert!(record.remote_id.is_none());
//!
//! record.remote_id = Some(RemoteEntryId::new("gid://catalog/Product/1"));
//! assert!(record.is_published());
//! ```

pub mod error;
pub mod ids;
pub mod record;

pub use error::{CoreError, Result};
pub use ids::{CollectionId, LocationId, RemoteEntryId, RunId, TenantId, VariantId};
pub use record::{
    normalize_key, CatalogRecord, PublishStatus, PRICE_SCALE, STATUS_AVAILABLE, STATUS_SOLD,
};
