//! Remote catalog traits
//!
//! Capability-based trait definitions for remote catalogs. Each concrete
//! marketplace is a distinct implementer; the sync engine depends on
//! [`FullCatalog`], which any type implementing every capability gets for
//! free.

use async_trait::async_trait;
use vitrine_core::{CollectionId, LocationId, RemoteEntryId, VariantId};

use crate::error::CatalogResult;
use crate::types::{EntryDraft, EntryPatch, OptionAxis, RemoteCatalogEntry};

/// Base trait for all remote catalogs.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Display name for logs.
    fn display_name(&self) -> &str;

    /// Check if the catalog is currently reachable.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Capability for managing catalog entries.
#[async_trait]
pub trait EntryOps: RemoteCatalog {
    /// Create an entry with one option-less variant.
    async fn create_entry(&self, draft: &EntryDraft) -> CatalogResult<RemoteCatalogEntry>;

    /// Apply scalar changes to an entry.
    async fn update_entry(
        &self,
        id: &RemoteEntryId,
        patch: &EntryPatch,
    ) -> CatalogResult<RemoteCatalogEntry>;

    /// Delete an entry. Returns `NotFound` if it does not exist.
    async fn delete_entry(&self, id: &RemoteEntryId) -> CatalogResult<()>;

    /// Fetch an entry by identifier.
    async fn get_entry(&self, id: &RemoteEntryId) -> CatalogResult<RemoteCatalogEntry>;

    /// Fetch every entry in the catalog.
    async fn list_all(&self) -> CatalogResult<Vec<RemoteCatalogEntry>>;

    /// Look up an entry by business key (SKU).
    ///
    /// When several entries share the key, the canonical one is returned
    /// (see [`RemoteCatalogEntry::canonical_cmp`]).
    async fn find_by_business_key(&self, sku: &str) -> CatalogResult<Option<RemoteCatalogEntry>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|e| e.sku == sku)
            .min_by(RemoteCatalogEntry::canonical_cmp))
    }
}

/// Capability for shaping option axes.
///
/// The platform has no atomic "replace options" call: options can only be
/// appended or removed wholesale.
#[async_trait]
pub trait OptionOps: RemoteCatalog {
    /// Append option axes to an entry.
    async fn create_options(
        &self,
        id: &RemoteEntryId,
        axes: &[OptionAxis],
    ) -> CatalogResult<RemoteCatalogEntry>;

    /// Remove every option axis, restoring the placeholder axis.
    async fn remove_options(&self, id: &RemoteEntryId) -> CatalogResult<RemoteCatalogEntry>;

    /// Set the per-axis values of an existing variant.
    async fn set_variant_option_values(
        &self,
        id: &RemoteEntryId,
        variant_id: &VariantId,
        values: &[String],
    ) -> CatalogResult<()>;
}

/// Capability for setting stock levels.
#[async_trait]
pub trait InventoryOps: RemoteCatalog {
    /// Set the stock level of a variant at a location to an absolute value.
    async fn set_inventory_level(
        &self,
        variant_id: &VariantId,
        location_id: &LocationId,
        level: i64,
    ) -> CatalogResult<()>;
}

/// Capability for managing collection memberships.
///
/// Adding an existing membership or removing a missing one is a no-op.
#[async_trait]
pub trait CollectionOps: RemoteCatalog {
    async fn add_collection_membership(
        &self,
        entry_id: &RemoteEntryId,
        collection_id: &CollectionId,
    ) -> CatalogResult<()>;

    async fn remove_collection_membership(
        &self,
        entry_id: &RemoteEntryId,
        collection_id: &CollectionId,
    ) -> CatalogResult<()>;

    async fn list_collection_memberships(
        &self,
        entry_id: &RemoteEntryId,
    ) -> CatalogResult<Vec<CollectionId>>;
}

/// Marker trait for catalogs supporting every capability.
pub trait FullCatalog: EntryOps + OptionOps + InventoryOps + CollectionOps {}

impl<T> FullCatalog for T where T: EntryOps + OptionOps + InventoryOps + CollectionOps {}
