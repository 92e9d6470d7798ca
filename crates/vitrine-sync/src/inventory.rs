//! Single-unit inventory policy.
//!
//! Every entry represents one physical unit, so its stock is either 0 or 1.
//! Levels are always written as absolute values; the policy never issues a
//! signed adjustment.

use tracing::{debug, error};
use vitrine_catalog::{FullCatalog, RemoteCatalogEntry};
use vitrine_core::{LocationId, VariantId, STATUS_SOLD};

use crate::error::{SyncError, SyncResult};

/// Target level of an unsold unit.
pub const IN_STOCK: i64 = 1;

/// Target level of a sold unit.
pub const OUT_OF_STOCK: i64 = 0;

/// One absolute inventory write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryWrite {
    pub variant_id: VariantId,
    pub location_id: LocationId,
    pub level: i64,
}

/// Maps record status to stock and enforces the single-unit invariant.
#[derive(Debug, Clone)]
pub struct InventoryPolicy {
    primary_location: LocationId,
}

impl InventoryPolicy {
    pub fn new(primary_location: LocationId) -> Self {
        Self { primary_location }
    }

    pub fn primary_location(&self) -> &LocationId {
        &self.primary_location
    }

    /// `SOLD` (any case) maps to 0, every other status to 1.
    #[must_use]
    pub fn target_level(status: &str) -> i64 {
        if status.trim().eq_ignore_ascii_case(STATUS_SOLD) {
            OUT_OF_STOCK
        } else {
            IN_STOCK
        }
    }

    /// Writes needed to bring `entry` to `target`.
    ///
    /// The primary variant holds the unit at the primary location; every
    /// other level of every variant is brought to zero. Levels already at
    /// their target produce no write.
    pub fn planned_writes(
        &self,
        entry: &RemoteCatalogEntry,
        target: i64,
    ) -> SyncResult<Vec<InventoryWrite>> {
        if !(OUT_OF_STOCK..=IN_STOCK).contains(&target) {
            return Err(SyncError::invariant(
                &entry.sku,
                format!("inventory target {target} is outside {{0, 1}}"),
            ));
        }
        let Some(primary) = entry.primary_variant() else {
            return Err(SyncError::invariant(&entry.sku, "entry has no variant"));
        };

        let mut writes = Vec::new();
        let current = primary
            .inventory
            .get(&self.primary_location)
            .copied()
            .unwrap_or(0);
        if current != target || !primary.inventory.contains_key(&self.primary_location) {
            writes.push(InventoryWrite {
                variant_id: primary.id.clone(),
                location_id: self.primary_location.clone(),
                level: target,
            });
        }

        for (index, variant) in entry.variants.iter().enumerate() {
            for (location, level) in &variant.inventory {
                let is_primary_slot = index == 0 && location == &self.primary_location;
                if !is_primary_slot && *level != 0 {
                    writes.push(InventoryWrite {
                        variant_id: variant.id.clone(),
                        location_id: location.clone(),
                        level: 0,
                    });
                }
            }
        }
        Ok(writes)
    }

    /// Set the entry's stock to `target` with absolute writes.
    ///
    /// Returns the number of writes issued.
    pub async fn apply_absolute(
        &self,
        catalog: &dyn FullCatalog,
        entry: &RemoteCatalogEntry,
        target: i64,
    ) -> SyncResult<usize> {
        let writes = self.planned_writes(entry, target)?;
        if writes.is_empty() {
            debug!(business_key = %entry.sku, target, "Inventory already at target");
            return Ok(0);
        }
        for write in &writes {
            debug!(
                business_key = %entry.sku,
                variant_id = %write.variant_id,
                location_id = %write.location_id,
                level = write.level,
                "Setting absolute inventory level"
            );
            catalog
                .set_inventory_level(&write.variant_id, &write.location_id, write.level)
                .await?;
        }
        Ok(writes.len())
    }

    /// Check the single-unit invariant, and the expected level when given.
    pub fn check_invariant(entry: &RemoteCatalogEntry, expected: Option<i64>) -> SyncResult<()> {
        let negative = entry
            .variants
            .iter()
            .flat_map(|v| v.inventory.values())
            .any(|level| *level < 0);
        let total = entry.total_inventory();

        let violation = if negative {
            Some("negative inventory level".to_string())
        } else if !(OUT_OF_STOCK..=IN_STOCK).contains(&total) {
            Some(format!("total inventory {total} is outside {{0, 1}}"))
        } else {
            match expected {
                Some(expected) if expected != total => {
                    Some(format!("total inventory {total}, expected {expected}"))
                }
                _ => None,
            }
        };

        match violation {
            Some(message) => {
                error!(business_key = %entry.sku, entry_id = %entry.id, %message, "Inventory invariant violated");
                Err(SyncError::invariant(&entry.sku, message))
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_catalog::{EntryDraft, EntryOps, InMemoryCatalog};

    fn policy(catalog: &InMemoryCatalog) -> InventoryPolicy {
        InventoryPolicy::new(catalog.location().clone())
    }

    async fn created(catalog: &InMemoryCatalog) -> RemoteCatalogEntry {
        catalog
            .create_entry(&EntryDraft {
                title: "Watch".to_string(),
                sku: "T-1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_target_level() {
        assert_eq!(InventoryPolicy::target_level("SOLD"), 0);
        assert_eq!(InventoryPolicy::target_level(" sold "), 0);
        assert_eq!(InventoryPolicy::target_level("Sold"), 0);
        assert_eq!(InventoryPolicy::target_level("AVAILABLE"), 1);
        assert_eq!(InventoryPolicy::target_level("ON_HOLD"), 1);
    }

    #[tokio::test]
    async fn test_apply_is_absolute_and_idempotent() {
        let catalog = InMemoryCatalog::new();
        let policy = policy(&catalog);
        let entry = created(&catalog).await;

        assert_eq!(policy.apply_absolute(&catalog, &entry, 1).await.unwrap(), 1);
        let entry = catalog.get_entry(&entry.id).await.unwrap();
        assert_eq!(entry.total_inventory(), 1);

        for _ in 0..3 {
            let entry = catalog.get_entry(&entry.id).await.unwrap();
            assert_eq!(policy.apply_absolute(&catalog, &entry, 1).await.unwrap(), 0);
        }
        let entry = catalog.get_entry(&entry.id).await.unwrap();
        assert_eq!(entry.total_inventory(), 1);
        assert_eq!(catalog.call_count("set_inventory_level").await, 1);
    }

    #[tokio::test]
    async fn test_sold_stays_at_zero_on_repeated_updates() {
        let catalog = InMemoryCatalog::new();
        let policy = policy(&catalog);
        let entry = created(&catalog).await;

        for _ in 0..3 {
            let entry = catalog.get_entry(&entry.id).await.unwrap();
            policy.apply_absolute(&catalog, &entry, 0).await.unwrap();
        }
        let entry = catalog.get_entry(&entry.id).await.unwrap();
        assert_eq!(entry.total_inventory(), 0);
    }

    #[tokio::test]
    async fn test_stray_locations_are_zeroed() {
        let catalog = InMemoryCatalog::new();
        let policy = policy(&catalog);
        let entry = created(&catalog).await;
        catalog
            .edit_raw(&entry.id, |e| {
                e.variants[0]
                    .inventory
                    .insert(LocationId::new("gid://catalog/Location/2"), 3);
            })
            .await
            .unwrap();

        let entry = catalog.get_entry(&entry.id).await.unwrap();
        assert!(InventoryPolicy::check_invariant(&entry, None).is_err());

        policy.apply_absolute(&catalog, &entry, 1).await.unwrap();
        let entry = catalog.get_entry(&entry.id).await.unwrap();
        assert!(InventoryPolicy::check_invariant(&entry, Some(1)).is_ok());
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_target() {
        let catalog = InMemoryCatalog::new();
        let entry = created(&catalog).await;
        let err = policy(&catalog)
            .apply_absolute(&catalog, &entry, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvariantViolation { .. }));
        assert_eq!(catalog.call_count("set_inventory_level").await, 0);
    }

    #[tokio::test]
    async fn test_check_invariant_expected_level() {
        let catalog = InMemoryCatalog::new();
        let entry = created(&catalog).await;
        assert!(InventoryPolicy::check_invariant(&entry, Some(0)).is_ok());
        assert!(InventoryPolicy::check_invariant(&entry, Some(1)).is_err());
    }
}
