//! Change detection between a feed snapshot and the stored records.
//!
//! Two versions of a record are equal for catalog purposes when every field
//! in [`COMPARISON_FIELDS`] matches after trimming. Fields outside the table
//! (secondary prices, sync bookkeeping) never cause a change on their own.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};
use vitrine_core::{normalize_key, CatalogRecord, CoreError};

/// One business-significant field and how to read it.
#[derive(Clone, Copy)]
pub struct ComparisonField {
    pub name: &'static str,
    pub extract: fn(&CatalogRecord) -> String,
}

impl std::fmt::Debug for ComparisonField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparisonField")
            .field("name", &self.name)
            .finish()
    }
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

/// The comparison allowlist.
///
/// `price` is the only price field present; cost, wholesale and list prices
/// are deliberately absent.
pub const COMPARISON_FIELDS: &[ComparisonField] = &[
    ComparisonField {
        name: "description",
        extract: |r| text(&r.description),
    },
    ComparisonField {
        name: "designer",
        extract: |r| text(&r.designer),
    },
    ComparisonField {
        name: "model",
        extract: |r| text(&r.model),
    },
    ComparisonField {
        name: "year",
        extract: |r| text(&r.year),
    },
    ComparisonField {
        name: "category",
        extract: |r| text(&r.category),
    },
    ComparisonField {
        name: "material",
        extract: |r| text(&r.material),
    },
    ComparisonField {
        name: "dial",
        extract: |r| text(&r.dial),
    },
    ComparisonField {
        name: "diameter",
        extract: |r| text(&r.diameter),
    },
    ComparisonField {
        name: "condition",
        extract: |r| text(&r.condition),
    },
    ComparisonField {
        name: "serial_number",
        extract: |r| text(&r.serial_number),
    },
    ComparisonField {
        name: "reference_number",
        extract: |r| text(&r.reference_number),
    },
    ComparisonField {
        name: "style",
        extract: |r| text(&r.style),
    },
    ComparisonField {
        name: "status",
        extract: |r| r.status.trim().to_string(),
    },
    ComparisonField {
        name: "image_urls",
        extract: |r| {
            r.image_urls
                .iter()
                .map(|u| u.trim())
                .collect::<Vec<_>>()
                .join("\n")
        },
    },
    ComparisonField {
        name: "price",
        extract: |r| r.price.map(|p| p.normalize().to_string()).unwrap_or_default(),
    },
];

/// Names of the allowlisted fields that differ between two versions.
#[must_use]
pub fn changed_fields(stored: &CatalogRecord, incoming: &CatalogRecord) -> Vec<&'static str> {
    COMPARISON_FIELDS
        .iter()
        .filter(|f| (f.extract)(stored) != (f.extract)(incoming))
        .map(|f| f.name)
        .collect()
}

/// Whether two versions are equal for catalog purposes.
#[must_use]
pub fn equal_for_catalog(stored: &CatalogRecord, incoming: &CatalogRecord) -> bool {
    COMPARISON_FIELDS
        .iter()
        .all(|f| (f.extract)(stored) == (f.extract)(incoming))
}

/// A record present in both the feed and the store.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    pub stored: CatalogRecord,
    pub incoming: CatalogRecord,
    pub changed: bool,
    /// Allowlisted fields that differ. Empty when unchanged.
    pub changed_fields: Vec<&'static str>,
}

impl ChangeRecord {
    fn new(stored: CatalogRecord, incoming: CatalogRecord) -> Self {
        let changed_fields = changed_fields(&stored, &incoming);
        Self {
            changed: !changed_fields.is_empty(),
            changed_fields,
            stored,
            incoming,
        }
    }

    #[must_use]
    pub fn business_key(&self) -> &str {
        self.incoming.business_key()
    }
}

/// Why a feed record was kept out of the partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// Key is empty after trimming.
    BlankKey,
    /// Key already seen earlier in the same snapshot.
    DuplicateKey,
    /// Record has a usable key but fails validation.
    Invalid { error: CoreError },
}

impl RejectReason {
    /// Convert into the error reported for the record.
    #[must_use]
    pub fn to_error(&self, business_key: &str) -> crate::error::SyncError {
        match self {
            RejectReason::BlankKey => CoreError::BlankKey.into(),
            RejectReason::DuplicateKey => crate::error::SyncError::DuplicateKey {
                business_key: business_key.to_string(),
            },
            RejectReason::Invalid { error } => error.clone().into(),
        }
    }
}

/// A feed record that takes no part in the sync.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRecord {
    pub record: CatalogRecord,
    pub reason: RejectReason,
}

/// Classification of a feed snapshot against a store snapshot.
///
/// `new`, `changed`, `unchanged` and `deleted` partition the union of the
/// usable feed keys and the store keys. `rejected` holds feed records with a
/// usable key that failed validation; their stored counterpart, if any, is
/// left alone. `excluded` holds records whose key is blank or repeated.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeSet {
    pub new: Vec<CatalogRecord>,
    pub changed: Vec<ChangeRecord>,
    pub unchanged: Vec<ChangeRecord>,
    pub deleted: Vec<CatalogRecord>,
    pub rejected: Vec<RejectedRecord>,
    pub excluded: Vec<RejectedRecord>,
}

impl ChangeSet {
    /// Number of keys in the four-way partition.
    #[must_use]
    pub fn partitioned_len(&self) -> usize {
        self.new.len() + self.changed.len() + self.unchanged.len() + self.deleted.len()
    }

    /// Keys of every record in the four-way partition.
    #[must_use]
    pub fn partitioned_keys(&self) -> BTreeSet<String> {
        self.new
            .iter()
            .map(|r| r.business_key().to_string())
            .chain(self.changed.iter().map(|c| c.business_key().to_string()))
            .chain(self.unchanged.iter().map(|c| c.business_key().to_string()))
            .chain(self.deleted.iter().map(|r| r.business_key().to_string()))
            .collect()
    }

    /// Whether nothing needs a remote mutation.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.new.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// Classifies feed records against stored records.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Partition `feed` against `stored`.
    ///
    /// Both slices must come from one consistent snapshot each. The first
    /// occurrence of a repeated feed key wins.
    #[must_use]
    pub fn classify(&self, feed: &[CatalogRecord], stored: &[CatalogRecord]) -> ChangeSet {
        let mut set = ChangeSet::default();

        let mut stored_by_key: BTreeMap<String, &CatalogRecord> = BTreeMap::new();
        for record in stored {
            let key = normalize_key(&record.tag_number);
            if key.is_empty() {
                warn!("Ignoring stored record with a blank business key");
                continue;
            }
            stored_by_key.entry(key).or_insert(record);
        }

        let mut seen: BTreeSet<String> = BTreeSet::new();
        for record in feed {
            let key = normalize_key(&record.tag_number);
            if key.is_empty() {
                debug!("Excluding feed record with a blank business key");
                set.excluded.push(RejectedRecord {
                    record: record.clone(),
                    reason: RejectReason::BlankKey,
                });
                continue;
            }
            if !seen.insert(key.clone()) {
                warn!(business_key = %key, "Duplicate business key in feed snapshot");
                set.excluded.push(RejectedRecord {
                    record: record.clone(),
                    reason: RejectReason::DuplicateKey,
                });
                continue;
            }

            let mut incoming = record.clone();
            incoming.tag_number = key.clone();

            if let Err(error) = incoming.validate() {
                debug!(business_key = %key, error = %error, "Rejecting invalid feed record");
                set.rejected.push(RejectedRecord {
                    record: incoming,
                    reason: RejectReason::Invalid { error },
                });
                continue;
            }

            match stored_by_key.get(&key) {
                None => set.new.push(incoming),
                Some(stored) => {
                    let change = ChangeRecord::new((*stored).clone(), incoming);
                    if change.changed {
                        debug!(
                            business_key = %key,
                            fields = ?change.changed_fields,
                            "Record changed"
                        );
                        set.changed.push(change);
                    } else {
                        set.unchanged.push(change);
                    }
                }
            }
        }

        for (key, record) in stored_by_key {
            if !seen.contains(&key) {
                set.deleted.push(record.clone());
            }
        }

        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use vitrine_core::STATUS_SOLD;

    fn record(key: &str) -> CatalogRecord {
        let mut record = CatalogRecord::new(key);
        record.designer = Some("Rolex".to_string());
        record.model = Some("Submariner".to_string());
        record.dial = Some("Black".to_string());
        record.price = Some(Decimal::new(950_000, 2));
        record
    }

    #[test]
    fn test_allowlist_excludes_secondary_prices() {
        let names: Vec<_> = COMPARISON_FIELDS.iter().map(|f| f.name).collect();
        assert!(names.contains(&"price"));
        assert!(!names.contains(&"cost_price"));
        assert!(!names.contains(&"wholesale_price"));
        assert!(!names.contains(&"list_price"));
    }

    #[test]
    fn test_secondary_price_change_is_unchanged() {
        let stored = record("T-1");
        let mut incoming = stored.clone();
        incoming.cost_price = Some(Decimal::new(1, 0));
        incoming.wholesale_price = Some(Decimal::new(2, 0));
        incoming.list_price = Some(Decimal::new(3, 0));

        let set = ChangeDetector::new().classify(&[incoming], &[stored]);
        assert_eq!(set.unchanged.len(), 1);
        assert!(set.changed.is_empty());
    }

    #[test]
    fn test_each_allowlisted_field_triggers_change() {
        let stored = record("T-1");
        let mutations: Vec<(&str, fn(&mut CatalogRecord))> = vec![
            ("description", |r| r.description = Some("new".into())),
            ("designer", |r| r.designer = Some("Omega".into())),
            ("model", |r| r.model = Some("Daytona".into())),
            ("year", |r| r.year = Some("1999".into())),
            ("category", |r| r.category = Some("Watches".into())),
            ("material", |r| r.material = Some("Gold".into())),
            ("dial", |r| r.dial = Some("Blue".into())),
            ("diameter", |r| r.diameter = Some("40mm".into())),
            ("condition", |r| r.condition = Some("Mint".into())),
            ("serial_number", |r| r.serial_number = Some("S1".into())),
            ("reference_number", |r| r.reference_number = Some("R1".into())),
            ("style", |r| r.style = Some("Mens".into())),
            ("status", |r| r.status = STATUS_SOLD.into()),
            ("image_urls", |r| r.image_urls = vec!["x.jpg".into()]),
            ("price", |r| r.price = Some(Decimal::new(1, 0))),
        ];
        assert_eq!(mutations.len(), COMPARISON_FIELDS.len());

        for (name, mutate) in mutations {
            let mut incoming = stored.clone();
            mutate(&mut incoming);
            assert_eq!(changed_fields(&stored, &incoming), vec![name], "field {name}");
        }
    }

    #[test]
    fn test_multiple_changes_yield_one_change_record() {
        let stored = record("T-1");
        let mut incoming = stored.clone();
        incoming.description = Some("new".to_string());
        incoming.model = Some("GMT".to_string());
        incoming.cost_price = Some(Decimal::new(5, 0));

        let set = ChangeDetector::new().classify(&[incoming], &[stored]);
        assert_eq!(set.changed.len(), 1);
        assert_eq!(set.changed[0].changed_fields, vec!["description", "model"]);
    }

    #[test]
    fn test_normalization_ignores_whitespace_and_price_scale() {
        let stored = record("T-1");
        let mut incoming = stored.clone();
        incoming.tag_number = "  T-1 ".to_string();
        incoming.designer = Some(" Rolex ".to_string());
        incoming.price = Some(Decimal::new(95_000_000, 4));

        assert!(equal_for_catalog(&stored, &incoming));
        let set = ChangeDetector::new().classify(&[incoming], &[stored]);
        assert_eq!(set.unchanged.len(), 1);
        assert_eq!(set.unchanged[0].incoming.tag_number, "T-1");
    }

    #[test]
    fn test_partition_is_complete_and_disjoint() {
        let stored = vec![record("A"), record("B"), record("C")];
        let mut changed_b = record("B");
        changed_b.description = Some("changed".to_string());
        let feed = vec![record("A"), changed_b, record("D")];

        let set = ChangeDetector::new().classify(&feed, &stored);
        assert_eq!(set.new.len(), 1);
        assert_eq!(set.changed.len(), 1);
        assert_eq!(set.unchanged.len(), 1);
        assert_eq!(set.deleted.len(), 1);
        assert_eq!(set.deleted[0].tag_number, "C");

        let keys = set.partitioned_keys();
        assert_eq!(keys.len(), set.partitioned_len());
        let expected: BTreeSet<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_blank_key_is_excluded_entirely() {
        let stored = vec![record("A")];
        let feed = vec![record("A"), record("   ")];

        let set = ChangeDetector::new().classify(&feed, &stored);
        assert_eq!(set.excluded.len(), 1);
        assert_eq!(set.excluded[0].reason, RejectReason::BlankKey);
        assert_eq!(set.partitioned_len(), 1);
    }

    #[test]
    fn test_duplicate_feed_key_first_wins() {
        let mut second = record("A");
        second.description = Some("second".to_string());
        let feed = vec![record("A"), second];

        let set = ChangeDetector::new().classify(&feed, &[]);
        assert_eq!(set.new.len(), 1);
        assert_eq!(set.new[0].description, None);
        assert_eq!(set.excluded[0].reason, RejectReason::DuplicateKey);
    }

    #[test]
    fn test_invalid_record_is_rejected_and_not_deleted() {
        let stored = vec![record("A")];
        let mut incoming = record("A");
        incoming.price = Some(Decimal::new(-1, 0));

        let set = ChangeDetector::new().classify(&[incoming], &stored);
        assert_eq!(set.rejected.len(), 1);
        assert!(set.deleted.is_empty());
        assert!(matches!(
            set.rejected[0].reason,
            RejectReason::Invalid { .. }
        ));
    }

    #[test]
    fn test_quiet_change_set() {
        let stored = vec![record("A")];
        let set = ChangeDetector::new().classify(&[record("A")], &stored);
        assert!(set.is_quiet());
    }
}
