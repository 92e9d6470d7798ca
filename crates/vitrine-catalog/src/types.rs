//! Remote catalog types
//!
//! Projection of a catalog entry as it exists in the remote catalog, plus the
//! payloads used to create and patch entries.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vitrine_core::{CollectionId, LocationId, RemoteEntryId, VariantId};

/// Name of the synthetic option axis the platform attaches to entries created
/// without options.
pub const PLACEHOLDER_OPTION_NAME: &str = "Title";

/// Value of the synthetic placeholder option axis.
pub const PLACEHOLDER_OPTION_VALUE: &str = "Default Title";

/// Stock location every catalog starts with.
pub const DEFAULT_LOCATION: &str = "gid://catalog/Location/1";

/// A named option axis (e.g. "Color") with its position and values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionAxis {
    pub name: String,
    /// 1-based position of the axis on the entry.
    pub position: u32,
    pub values: Vec<String>,
}

impl OptionAxis {
    /// Create a single-valued axis.
    pub fn single(name: impl Into<String>, position: u32, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position,
            values: vec![value.into()],
        }
    }

    /// The platform's placeholder axis.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::single(PLACEHOLDER_OPTION_NAME, 1, PLACEHOLDER_OPTION_VALUE)
    }

    /// Whether this is the platform's placeholder axis.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.name == PLACEHOLDER_OPTION_NAME
            && self.values.len() == 1
            && self.values[0] == PLACEHOLDER_OPTION_VALUE
    }
}

/// A purchasable variant of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub sku: String,
    /// One value per option axis, in axis position order.
    pub option_values: Vec<String>,
    /// Stock level per location.
    #[serde(default)]
    pub inventory: BTreeMap<LocationId, i64>,
}

impl Variant {
    /// Total stock across all locations.
    #[must_use]
    pub fn total_inventory(&self) -> i64 {
        self.inventory.values().sum()
    }
}

/// A namespaced key/value attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Metafield {
    pub namespace: String,
    pub key: String,
    pub value: String,
}

impl Metafield {
    pub fn new(
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A catalog entry as it exists in the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCatalogEntry {
    pub id: RemoteEntryId,
    pub title: String,
    pub description: String,
    /// Business key of the source record.
    pub sku: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub options: Vec<OptionAxis>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub metafields: Vec<Metafield>,
    #[serde(default)]
    pub collections: BTreeSet<CollectionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RemoteCatalogEntry {
    /// The entry's first variant. Single-variant entries have only this one.
    #[must_use]
    pub fn primary_variant(&self) -> Option<&Variant> {
        self.variants.first()
    }

    /// Number of variants on the entry.
    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Total stock across every variant and location.
    #[must_use]
    pub fn total_inventory(&self) -> i64 {
        self.variants.iter().map(Variant::total_inventory).sum()
    }

    /// Whether the entry only carries the platform's placeholder axis.
    #[must_use]
    pub fn has_placeholder_options(&self) -> bool {
        self.options.len() == 1 && self.options[0].is_placeholder()
    }

    /// Option axes excluding the platform placeholder.
    #[must_use]
    pub fn real_options(&self) -> &[OptionAxis] {
        if self.has_placeholder_options() {
            &[]
        } else {
            &self.options
        }
    }

    /// Order in which entries sharing a business key are ranked.
    ///
    /// The earliest created entry comes first; entries created at the same
    /// instant are ranked by identifier. The first entry in this order is the
    /// canonical one for its key.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Look up a metafield value.
    #[must_use]
    pub fn metafield(&self, namespace: &str, key: &str) -> Option<&str> {
        self.metafields
            .iter()
            .find(|m| m.namespace == namespace && m.key == key)
            .map(|m| m.value.as_str())
    }
}

/// Payload for creating an entry with its initial, option-less variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub title: String,
    pub description: String,
    pub sku: String,
    pub images: Vec<String>,
    pub metafields: Vec<Metafield>,
}

/// Scalar changes to an existing entry. `None` leaves a field untouched;
/// `images` replaces the whole image list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub images: Option<Vec<String>>,
    pub metafields: Option<Vec<Metafield>>,
}

impl EntryPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.images.is_none()
            && self.metafields.is_none()
    }
}
