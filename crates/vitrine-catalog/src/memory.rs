//! In-memory remote catalog.
//!
//! Reference implementer of every catalog capability. It reproduces the
//! platform behaviours the engine must cope with: entries are created with a
//! placeholder option axis, options can only be appended or removed
//! wholesale, and appending several axes to an entry that carries a single
//! real axis materializes a second variant instead of extending the first.
//! Every call is counted so callers can assert on remote traffic.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use vitrine_core::{CollectionId, LocationId, RemoteEntryId, VariantId};

use crate::error::{CatalogError, CatalogResult};
use crate::traits::{CollectionOps, EntryOps, InventoryOps, OptionOps, RemoteCatalog};
use crate::types::{
    EntryDraft, EntryPatch, OptionAxis, RemoteCatalogEntry, Variant, DEFAULT_LOCATION,
    PLACEHOLDER_OPTION_VALUE,
};

/// Operations that mutate remote state.
pub const MUTATING_OPERATIONS: &[&str] = &[
    "create_entry",
    "update_entry",
    "delete_entry",
    "create_options",
    "remove_options",
    "set_variant_option_values",
    "set_inventory_level",
    "add_collection_membership",
    "remove_collection_membership",
];

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<RemoteEntryId, RemoteCatalogEntry>,
    next_entry: u64,
    next_variant: u64,
    calls: BTreeMap<&'static str, usize>,
}

impl State {
    fn record(&mut self, operation: &'static str) {
        *self.calls.entry(operation).or_insert(0) += 1;
    }

    fn entry_mut(&mut self, id: &RemoteEntryId) -> CatalogResult<&mut RemoteCatalogEntry> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| CatalogError::not_found(id.as_str()))
    }

    fn next_variant_id(&mut self) -> VariantId {
        self.next_variant += 1;
        VariantId::new(format!("gid://catalog/ProductVariant/{:06}", self.next_variant))
    }
}

/// In-memory remote catalog.
#[derive(Debug)]
pub struct InMemoryCatalog {
    name: String,
    location: LocationId,
    state: RwLock<State>,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    /// Create an empty catalog with a single stock location.
    #[must_use]
    pub fn new() -> Self {
        Self::with_location(LocationId::new(DEFAULT_LOCATION))
    }

    /// Create an empty catalog whose new variants stock at `location`.
    #[must_use]
    pub fn with_location(location: LocationId) -> Self {
        Self {
            name: "in-memory catalog".to_string(),
            location,
            state: RwLock::new(State::default()),
        }
    }

    /// The stock location new variants are created at.
    pub fn location(&self) -> &LocationId {
        &self.location
    }

    /// Number of calls made to `operation`.
    pub async fn call_count(&self, operation: &str) -> usize {
        self.state
            .read()
            .await
            .calls
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    /// Number of mutating calls made since creation or the last reset.
    pub async fn mutation_count(&self) -> usize {
        let state = self.state.read().await;
        MUTATING_OPERATIONS
            .iter()
            .map(|op| state.calls.get(op).copied().unwrap_or(0))
            .sum()
    }

    /// Reset every call counter.
    pub async fn reset_counters(&self) {
        self.state.write().await.calls.clear();
    }

    /// Number of entries in the catalog.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Whether the catalog has no entries.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Insert an entry as-is, bypassing counters. Simulates out-of-band edits.
    pub async fn insert_raw(&self, entry: RemoteCatalogEntry) {
        self.state
            .write()
            .await
            .entries
            .insert(entry.id.clone(), entry);
    }

    /// Edit an entry in place, bypassing counters. Simulates manual edits.
    pub async fn edit_raw<F>(&self, id: &RemoteEntryId, edit: F) -> CatalogResult<()>
    where
        F: FnOnce(&mut RemoteCatalogEntry),
    {
        let mut state = self.state.write().await;
        edit(state.entry_mut(id)?);
        Ok(())
    }

    /// Remove an entry, bypassing counters. Simulates manual deletion.
    pub async fn remove_raw(&self, id: &RemoteEntryId) -> Option<RemoteCatalogEntry> {
        self.state.write().await.entries.remove(id)
    }
}

#[async_trait]
impl RemoteCatalog for InMemoryCatalog {
    fn display_name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl EntryOps for InMemoryCatalog {
    async fn create_entry(&self, draft: &EntryDraft) -> CatalogResult<RemoteCatalogEntry> {
        let mut state = self.state.write().await;
        state.record("create_entry");

        if draft.title.trim().is_empty() {
            return Err(CatalogError::invalid_data("title must not be blank"));
        }

        state.next_entry += 1;
        let id = RemoteEntryId::new(format!("gid://catalog/Product/{:06}", state.next_entry));
        let variant_id = state.next_variant_id();
        let now = Utc::now();

        let entry = RemoteCatalogEntry {
            id: id.clone(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            sku: draft.sku.clone(),
            images: draft.images.clone(),
            options: vec![OptionAxis::placeholder()],
            variants: vec![Variant {
                id: variant_id,
                sku: draft.sku.clone(),
                option_values: vec![PLACEHOLDER_OPTION_VALUE.to_string()],
                inventory: BTreeMap::from([(self.location.clone(), 0)]),
            }],
            metafields: draft.metafields.clone(),
            collections: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };

        debug!(entry_id = %id, sku = %draft.sku, "Created in-memory entry");
        state.entries.insert(id, entry.clone());
        Ok(entry)
    }

    async fn update_entry(
        &self,
        id: &RemoteEntryId,
        patch: &EntryPatch,
    ) -> CatalogResult<RemoteCatalogEntry> {
        let mut state = self.state.write().await;
        state.record("update_entry");
        let entry = state.entry_mut(id)?;

        if let Some(title) = &patch.title {
            entry.title = title.clone();
        }
        if let Some(description) = &patch.description {
            entry.description = description.clone();
        }
        if let Some(images) = &patch.images {
            entry.images = images.clone();
        }
        if let Some(metafields) = &patch.metafields {
            entry.metafields = metafields.clone();
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete_entry(&self, id: &RemoteEntryId) -> CatalogResult<()> {
        let mut state = self.state.write().await;
        state.record("delete_entry");
        state
            .entries
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CatalogError::not_found(id.as_str()))
    }

    async fn get_entry(&self, id: &RemoteEntryId) -> CatalogResult<RemoteCatalogEntry> {
        let mut state = self.state.write().await;
        state.record("get_entry");
        state.entry_mut(id).map(|e| e.clone())
    }

    async fn list_all(&self) -> CatalogResult<Vec<RemoteCatalogEntry>> {
        let mut state = self.state.write().await;
        state.record("list_all");
        Ok(state.entries.values().cloned().collect())
    }

    async fn find_by_business_key(&self, sku: &str) -> CatalogResult<Option<RemoteCatalogEntry>> {
        let mut state = self.state.write().await;
        state.record("find_by_business_key");
        Ok(state
            .entries
            .values()
            .filter(|e| e.sku == sku)
            .min_by(|a, b| a.canonical_cmp(b))
            .cloned())
    }
}

#[async_trait]
impl OptionOps for InMemoryCatalog {
    async fn create_options(
        &self,
        id: &RemoteEntryId,
        axes: &[OptionAxis],
    ) -> CatalogResult<RemoteCatalogEntry> {
        let mut state = self.state.write().await;
        state.record("create_options");

        if axes.iter().any(|a| a.values.is_empty()) {
            return Err(CatalogError::invalid_data("option axis without values"));
        }

        let existing = state.entry_mut(id)?.real_options().to_vec();
        if axes
            .iter()
            .any(|a| existing.iter().any(|e| e.name == a.name))
        {
            return Err(CatalogError::invalid_data("option axis already exists"));
        }
        let new_values: Vec<String> = axes.iter().map(|a| a.values[0].clone()).collect();

        // Appending several axes to a single real axis splits the entry into
        // a second variant on this platform.
        let split = existing.len() == 1 && axes.len() >= 2;
        let extra_variant_id = if split {
            Some(state.next_variant_id())
        } else {
            None
        };

        let entry = state.entry_mut(id)?;
        if existing.is_empty() {
            entry.options = axes
                .iter()
                .enumerate()
                .map(|(i, a)| OptionAxis {
                    position: i as u32 + 1,
                    ..a.clone()
                })
                .collect();
            for variant in &mut entry.variants {
                variant.option_values = new_values.clone();
            }
        } else {
            let offset = entry.options.len();
            entry
                .options
                .extend(axes.iter().enumerate().map(|(i, a)| OptionAxis {
                    position: (offset + i) as u32 + 1,
                    ..a.clone()
                }));
            for variant in &mut entry.variants {
                variant.option_values.extend(new_values.iter().cloned());
            }
            if let (Some(variant_id), Some(first)) =
                (extra_variant_id, entry.variants.first().cloned())
            {
                entry.variants.push(Variant {
                    id: variant_id,
                    ..first
                });
            }
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn remove_options(&self, id: &RemoteEntryId) -> CatalogResult<RemoteCatalogEntry> {
        let mut state = self.state.write().await;
        state.record("remove_options");
        let entry = state.entry_mut(id)?;

        entry.options = vec![OptionAxis::placeholder()];
        entry.variants.truncate(1);
        for variant in &mut entry.variants {
            variant.option_values = vec![PLACEHOLDER_OPTION_VALUE.to_string()];
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn set_variant_option_values(
        &self,
        id: &RemoteEntryId,
        variant_id: &VariantId,
        values: &[String],
    ) -> CatalogResult<()> {
        let mut state = self.state.write().await;
        state.record("set_variant_option_values");
        let entry = state.entry_mut(id)?;

        if values.len() != entry.options.len() {
            return Err(CatalogError::invalid_data(format!(
                "expected {} option values, got {}",
                entry.options.len(),
                values.len()
            )));
        }

        let variant = entry
            .variants
            .iter_mut()
            .find(|v| &v.id == variant_id)
            .ok_or_else(|| CatalogError::not_found(variant_id.as_str()))?;
        variant.option_values = values.to_vec();

        // Keep each axis listing the values in use.
        for (axis, value) in entry.options.iter_mut().zip(values) {
            if !axis.values.contains(value) {
                axis.values = vec![value.clone()];
            }
        }
        entry.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl InventoryOps for InMemoryCatalog {
    async fn set_inventory_level(
        &self,
        variant_id: &VariantId,
        location_id: &LocationId,
        level: i64,
    ) -> CatalogResult<()> {
        let mut state = self.state.write().await;
        state.record("set_inventory_level");

        if level < 0 {
            return Err(CatalogError::invalid_data("inventory level must not be negative"));
        }

        let entry = state
            .entries
            .values_mut()
            .find(|e| e.variants.iter().any(|v| &v.id == variant_id))
            .ok_or_else(|| CatalogError::not_found(variant_id.as_str()))?;
        if let Some(variant) = entry.variants.iter_mut().find(|v| &v.id == variant_id) {
            variant.inventory.insert(location_id.clone(), level);
        }
        entry.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl CollectionOps for InMemoryCatalog {
    async fn add_collection_membership(
        &self,
        entry_id: &RemoteEntryId,
        collection_id: &CollectionId,
    ) -> CatalogResult<()> {
        let mut state = self.state.write().await;
        state.record("add_collection_membership");
        let entry = state.entry_mut(entry_id)?;
        entry.collections.insert(collection_id.clone());
        Ok(())
    }

    async fn remove_collection_membership(
        &self,
        entry_id: &RemoteEntryId,
        collection_id: &CollectionId,
    ) -> CatalogResult<()> {
        let mut state = self.state.write().await;
        state.record("remove_collection_membership");
        let entry = state.entry_mut(entry_id)?;
        entry.collections.remove(collection_id);
        Ok(())
    }

    async fn list_collection_memberships(
        &self,
        entry_id: &RemoteEntryId,
    ) -> CatalogResult<Vec<CollectionId>> {
        let mut state = self.state.write().await;
        state.record("list_collection_memberships");
        let entry = state.entry_mut(entry_id)?;
        Ok(entry.collections.iter().cloned().collect())
    }
}
