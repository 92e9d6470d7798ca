//! Collection membership assignment.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vitrine_catalog::FullCatalog;
use vitrine_core::{CatalogRecord, CollectionId, RemoteEntryId};

use crate::error::{SyncError, SyncResult};

/// A price range mapped to a collection. `max` is exclusive; a band without
/// `max` is open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub min: Decimal,
    #[serde(default)]
    pub max: Option<Decimal>,
    pub collection_id: CollectionId,
}

impl PriceBand {
    #[must_use]
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.min && self.max.map_or(true, |max| price < max)
    }
}

/// Attribute to collection mapping table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMapping {
    /// Designer (brand) name to brand collection.
    #[serde(default)]
    pub designers: BTreeMap<String, CollectionId>,
    /// Style (gender) to gender collection.
    #[serde(default)]
    pub styles: BTreeMap<String, CollectionId>,
    /// Price tiers.
    #[serde(default)]
    pub price_bands: Vec<PriceBand>,
}

impl CollectionMapping {
    /// Check the table is usable: no blank keys, no empty or overlapping
    /// price bands.
    pub fn validate(&self) -> Result<(), String> {
        if self
            .designers
            .keys()
            .chain(self.styles.keys())
            .any(|k| k.trim().is_empty())
        {
            return Err("mapping keys must not be blank".to_string());
        }

        let mut bands: Vec<&PriceBand> = self.price_bands.iter().collect();
        bands.sort_by(|a, b| a.min.cmp(&b.min));
        for band in &bands {
            if band.max.is_some_and(|max| max <= band.min) {
                return Err(format!("price band starting at {} is empty", band.min));
            }
        }
        for pair in bands.windows(2) {
            match pair[0].max {
                Some(max) if max <= pair[1].min => {}
                _ => {
                    return Err(format!(
                        "price bands starting at {} and {} overlap",
                        pair[0].min, pair[1].min
                    ))
                }
            }
        }
        Ok(())
    }

    fn lookup<'a>(table: &'a BTreeMap<String, CollectionId>, value: &Option<String>) -> Option<&'a CollectionId> {
        let value = value.as_deref()?.trim();
        if value.is_empty() {
            return None;
        }
        table
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(value))
            .map(|(_, id)| id)
    }
}

/// Memberships to add and remove.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipDiff {
    pub to_add: BTreeSet<CollectionId>,
    pub to_remove: BTreeSet<CollectionId>,
}

impl MembershipDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

/// Computes and applies collection memberships.
#[derive(Debug, Clone, Default)]
pub struct CollectionAssigner {
    mapping: CollectionMapping,
}

impl CollectionAssigner {
    pub fn new(mapping: CollectionMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &CollectionMapping {
        &self.mapping
    }

    /// Collections the record belongs in.
    #[must_use]
    pub fn desired_memberships(&self, record: &CatalogRecord) -> BTreeSet<CollectionId> {
        let mut desired = BTreeSet::new();
        if let Some(id) = CollectionMapping::lookup(&self.mapping.designers, &record.designer) {
            desired.insert(id.clone());
        }
        if let Some(id) = CollectionMapping::lookup(&self.mapping.styles, &record.style) {
            desired.insert(id.clone());
        }
        if let Some(price) = record.price {
            desired.extend(
                self.mapping
                    .price_bands
                    .iter()
                    .filter(|b| b.contains(price))
                    .map(|b| b.collection_id.clone()),
            );
        }
        desired
    }

    /// Plain set difference between current and desired memberships.
    #[must_use]
    pub fn diff(
        current: &BTreeSet<CollectionId>,
        desired: &BTreeSet<CollectionId>,
    ) -> MembershipDiff {
        MembershipDiff {
            to_add: desired.difference(current).cloned().collect(),
            to_remove: current.difference(desired).cloned().collect(),
        }
    }

    /// Additions only, for freshly created entries.
    #[must_use]
    pub fn add_only(
        current: &BTreeSet<CollectionId>,
        desired: &BTreeSet<CollectionId>,
    ) -> MembershipDiff {
        MembershipDiff {
            to_add: desired.difference(current).cloned().collect(),
            to_remove: BTreeSet::new(),
        }
    }

    /// Apply removals then additions.
    ///
    /// Every operation is attempted. If none succeeds the first remote error
    /// is returned; if only some succeed the result is a partial membership
    /// error naming the collections left out of shape.
    pub async fn apply(
        &self,
        catalog: &dyn FullCatalog,
        entry_id: &RemoteEntryId,
        business_key: &str,
        diff: &MembershipDiff,
    ) -> SyncResult<()> {
        if diff.is_empty() {
            return Ok(());
        }

        let mut applied = 0usize;
        let mut failed: Vec<String> = Vec::new();
        let mut first_error = None;

        for collection_id in &diff.to_remove {
            match catalog
                .remove_collection_membership(entry_id, collection_id)
                .await
            {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!(business_key, collection_id = %collection_id, error = %e, "Failed to remove membership");
                    failed.push(format!("-{collection_id}"));
                    first_error.get_or_insert(e);
                }
            }
        }
        for collection_id in &diff.to_add {
            match catalog.add_collection_membership(entry_id, collection_id).await {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!(business_key, collection_id = %collection_id, error = %e, "Failed to add membership");
                    failed.push(format!("+{collection_id}"));
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => {
                info!(
                    business_key,
                    entry_id = %entry_id,
                    added = diff.to_add.len(),
                    removed = diff.to_remove.len(),
                    "Collection memberships applied"
                );
                Ok(())
            }
            Some(e) if applied == 0 => Err(e.into()),
            Some(_) => Err(SyncError::PartialMembership {
                business_key: business_key.to_string(),
                message: format!("failed: {}", failed.join(", ")),
            }),
        }
    }
}
