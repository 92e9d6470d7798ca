//! Option axis planning.
//!
//! Entries carry one variant and up to three option axes derived from the
//! record. The remote catalog can only append axes or remove them all, so
//! reaching a desired shape is either a no-op, an append, or a full
//! remove-and-recreate that re-applies values to the same variant.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use vitrine_catalog::{FullCatalog, OptionAxis, RemoteCatalogEntry};
use vitrine_core::{CatalogRecord, VariantId};

use crate::error::{SyncError, SyncResult};

/// Axis name fed by the dial colour.
pub const AXIS_COLOR: &str = "Color";

/// Axis name fed by the case diameter.
pub const AXIS_SIZE: &str = "Size";

/// Axis name fed by the case material.
pub const AXIS_MATERIAL: &str = "Material";

/// Axes the record should carry, in position order.
///
/// An axis is omitted when its source field is blank; positions stay
/// contiguous.
#[must_use]
pub fn desired_axes(record: &CatalogRecord) -> Vec<OptionAxis> {
    [
        (AXIS_COLOR, &record.dial),
        (AXIS_SIZE, &record.diameter),
        (AXIS_MATERIAL, &record.material),
    ]
    .into_iter()
    .filter_map(|(name, value)| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| (name, v.to_string()))
    })
    .enumerate()
    .map(|(i, (name, value))| OptionAxis::single(name, i as u32 + 1, value))
    .collect()
}

/// Per-axis values of a desired axis list.
#[must_use]
pub fn axis_values(axes: &[OptionAxis]) -> Vec<String> {
    axes.iter()
        .filter_map(|a| a.values.first().cloned())
        .collect()
}

/// Why an entry's options are rebuilt from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecreateReason {
    /// Only the platform's synthetic placeholder axis exists.
    PlaceholderOnly,
    /// One legacy axis exists and several are wanted; appending would split
    /// the variant.
    SingleLegacyAxis,
    /// An axis keeps its name but its value changes.
    ValueChanged,
    /// An existing axis is no longer wanted.
    AxisRemoved,
    /// Axis order or variant count differs.
    ShapeChanged,
}

/// How to reach the desired option shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditPlan {
    /// Already in shape.
    NoOp,
    /// Append the given axes; the variant is untouched.
    Additive { axes: Vec<OptionAxis> },
    /// Remove every axis, create `axes`, then set `values` on the same
    /// variant. Empty `axes` only removes.
    RemoveAndRecreate {
        axes: Vec<OptionAxis>,
        values: Vec<String>,
        reason: RecreateReason,
    },
}

impl EditPlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, EditPlan::NoOp)
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            EditPlan::NoOp => "noop",
            EditPlan::Additive { .. } => "additive",
            EditPlan::RemoveAndRecreate { .. } => "remove_and_recreate",
        }
    }
}

/// Plans and executes option edits.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantOptionPlanner;

impl VariantOptionPlanner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Choose the edit that takes `existing` to `desired`.
    #[must_use]
    pub fn plan(&self, existing: &RemoteCatalogEntry, desired: &[OptionAxis]) -> EditPlan {
        let recreate = |reason| EditPlan::RemoveAndRecreate {
            axes: desired.to_vec(),
            values: axis_values(desired),
            reason,
        };

        let current = existing.real_options();
        let current_values: &[String] = existing
            .primary_variant()
            .map(|v| v.option_values.as_slice())
            .unwrap_or_default();

        if existing.variant_count() != 1 {
            return recreate(RecreateReason::ShapeChanged);
        }

        if desired.is_empty() {
            return if current.is_empty() {
                EditPlan::NoOp
            } else {
                recreate(RecreateReason::AxisRemoved)
            };
        }

        if existing.has_placeholder_options() {
            return recreate(RecreateReason::PlaceholderOnly);
        }

        let desired_values = axis_values(desired);
        let matches_at = |i: usize| {
            current[i].name == desired[i].name
                && current[i].position == desired[i].position
                && current_values.get(i) == desired_values.get(i)
        };

        if current.len() <= desired.len() && (0..current.len()).all(matches_at) {
            if current.len() == desired.len() {
                return if current_values.len() == desired_values.len() {
                    EditPlan::NoOp
                } else {
                    recreate(RecreateReason::ShapeChanged)
                };
            }
            if current.len() == 1 {
                return recreate(RecreateReason::SingleLegacyAxis);
            }
            return EditPlan::Additive {
                axes: desired[current.len()..].to_vec(),
            };
        }

        let removed = current
            .iter()
            .any(|c| !desired.iter().any(|d| d.name == c.name));
        if removed {
            return recreate(RecreateReason::AxisRemoved);
        }
        let same_names = current.len() == desired.len()
            && current.iter().zip(desired).all(|(c, d)| c.name == d.name);
        if same_names {
            recreate(RecreateReason::ValueChanged)
        } else {
            recreate(RecreateReason::ShapeChanged)
        }
    }

    /// Execute `plan` against `entry` and return the entry as left remotely.
    pub async fn execute(
        &self,
        catalog: &dyn FullCatalog,
        entry: &RemoteCatalogEntry,
        plan: &EditPlan,
    ) -> SyncResult<RemoteCatalogEntry> {
        match plan {
            EditPlan::NoOp => {
                debug!(business_key = %entry.sku, "Options already in shape");
                Ok(entry.clone())
            }
            EditPlan::Additive { axes } => {
                info!(
                    business_key = %entry.sku,
                    entry_id = %entry.id,
                    appended = axes.len(),
                    "Appending option axes"
                );
                Ok(catalog.create_options(&entry.id, axes).await?)
            }
            EditPlan::RemoveAndRecreate {
                axes,
                values,
                reason,
            } => {
                let Some(variant_id) = entry.primary_variant().map(|v| v.id.clone()) else {
                    return Err(SyncError::invariant(&entry.sku, "entry has no variant"));
                };
                info!(
                    business_key = %entry.sku,
                    entry_id = %entry.id,
                    variant_id = %variant_id,
                    reason = ?reason,
                    axes = axes.len(),
                    "Recreating option axes"
                );
                let cleared = catalog.remove_options(&entry.id).await?;
                if axes.is_empty() {
                    return Ok(cleared);
                }
                catalog.create_options(&entry.id, axes).await?;
                catalog
                    .set_variant_option_values(&entry.id, &variant_id, values)
                    .await?;
                Ok(catalog.get_entry(&entry.id).await?)
            }
        }
    }

    /// Check that `entry` has one variant, still `variant_id`, carrying
    /// exactly the desired values.
    pub fn verify_postcondition(
        entry: &RemoteCatalogEntry,
        desired: &[OptionAxis],
        variant_id: &VariantId,
    ) -> SyncResult<()> {
        let fail = |message: String| {
            error!(business_key = %entry.sku, entry_id = %entry.id, %message, "Option invariant violated");
            Err(SyncError::invariant(&entry.sku, message))
        };

        if entry.variant_count() != 1 {
            return fail(format!("expected 1 variant, found {}", entry.variant_count()));
        }
        let Some(variant) = entry.primary_variant() else {
            return fail("entry has no variant".to_string());
        };
        if &variant.id != variant_id {
            return fail(format!("variant id changed from {variant_id} to {}", variant.id));
        }

        let current_names: Vec<&str> = entry.real_options().iter().map(|a| a.name.as_str()).collect();
        let desired_names: Vec<&str> = desired.iter().map(|a| a.name.as_str()).collect();
        if current_names != desired_names {
            return fail(format!("option axes {current_names:?}, expected {desired_names:?}"));
        }
        if !desired.is_empty() && variant.option_values != axis_values(desired) {
            return fail(format!(
                "option values {:?}, expected {:?}",
                variant.option_values,
                axis_values(desired)
            ));
        }
        Ok(())
    }
}
