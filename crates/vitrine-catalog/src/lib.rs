//! vitrine Remote Catalog
//!
//! Operation contract of the remote e-commerce catalog the sync engine
//! mutates, independent of any transport.
//!
//! # Capabilities
//!
//! - [`EntryOps`] - create, update, delete, fetch and list entries
//! - [`OptionOps`] - append or remove option axes, set variant option values
//! - [`InventoryOps`] - absolute stock levels per location
//! - [`CollectionOps`] - idempotent collection memberships
//!
//! [`ResilientCatalog`] decorates any [`FullCatalog`] with bounded retries
//! and rate limiting. [`InMemoryCatalog`] is a reference implementer for
//! dry runs and tests.
//!
//! # Example
//!
//! ```
//! use vitrine_catalog::{EntryDraft, EntryOps, InMemoryCatalog};
//!
//! # tokio_test_block(async {
//! let catalog = InMemoryCatalog::new();
//! let entry = catalog
//!     .create_entry(&EntryDraft {
//!         title: "Rolex Submariner".to_string(),
//!         sku: "T-1001".to_string(),
//!         ..Default::default()
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(entry.variant_count(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod rate_limiter;
pub mod resilience;
pub mod traits;
pub mod types;

pub use error::{CatalogError, CatalogResult};
pub use memory::InMemoryCatalog;
pub use rate_limiter::TokenBucket;
pub use resilience::{ResilientCatalog, RetryConfig, RetryExecutor};
pub use traits::{CollectionOps, EntryOps, FullCatalog, InventoryOps, OptionOps, RemoteCatalog};
pub use types::{
    EntryDraft, EntryPatch, Metafield, OptionAxis, RemoteCatalogEntry, Variant,
    DEFAULT_LOCATION, PLACEHOLDER_OPTION_NAME, PLACEHOLDER_OPTION_VALUE,
};
