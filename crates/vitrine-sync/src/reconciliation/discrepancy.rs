//! Three-way discrepancy analysis.
//!
//! [`analyze_snapshots`] is a pure function over one snapshot of each
//! source. Every remote entry and every store row ends up in at most one
//! repair category.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vitrine_catalog::RemoteCatalogEntry;
use vitrine_core::{normalize_key, CatalogRecord, RemoteEntryId};

use crate::draft;
use crate::inventory::InventoryPolicy;

/// Kind of drift between the three sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyType {
    /// Remote entry no store row points at.
    ExtraInRemote,
    /// Store row whose remote entry is gone.
    ExtraInStore,
    /// Stored remote id disagrees with a lookup by business key.
    IdMismatch,
    /// Remote image count differs from the stored record.
    ImageCountMismatch,
    /// Several remote entries share one business key.
    DuplicateKey,
    /// Remote entry breaks the single-variant or single-unit invariant.
    InvariantBreach,
}

impl DiscrepancyType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyType::ExtraInRemote => "extra_in_remote",
            DiscrepancyType::ExtraInStore => "extra_in_store",
            DiscrepancyType::IdMismatch => "id_mismatch",
            DiscrepancyType::ImageCountMismatch => "image_count_mismatch",
            DiscrepancyType::DuplicateKey => "duplicate_key",
            DiscrepancyType::InvariantBreach => "invariant_breach",
        }
    }
}

impl std::fmt::Display for DiscrepancyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote entry not referenced by the store.
///
/// When its key is still in the feed the entry is linked, otherwise it is a
/// deletion candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraRemote {
    pub remote_id: RemoteEntryId,
    pub business_key: String,
    pub in_feed: bool,
}

/// Store row whose remote entry no longer exists.
///
/// Rows still in the feed are unlinked and republished; the rest are
/// deletion candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraStore {
    pub business_key: String,
    pub remote_id: Option<RemoteEntryId>,
    pub in_feed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMismatch {
    pub business_key: String,
    pub stored_remote_id: Option<RemoteEntryId>,
    pub remote_lookup_id: RemoteEntryId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCountMismatch {
    pub business_key: String,
    pub remote_id: RemoteEntryId,
    pub expected: usize,
    pub actual: usize,
}

/// Entries sharing a key. `canonical` is kept, `extras` are deletion
/// candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateKey {
    pub business_key: String,
    pub canonical: RemoteEntryId,
    pub extras: Vec<RemoteEntryId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantBreach {
    pub business_key: String,
    pub remote_id: RemoteEntryId,
    pub message: String,
}

/// Result of comparing feed, store and remote catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscrepancyReport {
    pub generated_at: DateTime<Utc>,
    pub feed_size: usize,
    pub store_size: usize,
    pub remote_size: usize,
    pub extra_in_remote: Vec<ExtraRemote>,
    pub extra_in_store: Vec<ExtraStore>,
    pub id_mismatches: Vec<IdMismatch>,
    pub image_count_mismatches: Vec<ImageCountMismatch>,
    pub duplicate_keys: Vec<DuplicateKey>,
    pub invariant_breaches: Vec<InvariantBreach>,
    /// Remote entries and store rows a repair would delete.
    pub proposed_deletions: usize,
    /// Larger of the remote and store sizes.
    pub total_catalog_size: usize,
    pub max_deletion_ratio: f64,
    pub exceeds_safety_threshold: bool,
}

impl DiscrepancyReport {
    /// Count per discrepancy type.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<DiscrepancyType, usize> {
        BTreeMap::from([
            (DiscrepancyType::ExtraInRemote, self.extra_in_remote.len()),
            (DiscrepancyType::ExtraInStore, self.extra_in_store.len()),
            (DiscrepancyType::IdMismatch, self.id_mismatches.len()),
            (
                DiscrepancyType::ImageCountMismatch,
                self.image_count_mismatches.len(),
            ),
            (DiscrepancyType::DuplicateKey, self.duplicate_keys.len()),
            (DiscrepancyType::InvariantBreach, self.invariant_breaches.len()),
        ])
    }

    #[must_use]
    pub fn total_discrepancies(&self) -> usize {
        self.counts().values().sum()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.total_discrepancies() == 0
    }

    /// Share of the catalog a repair would delete.
    #[must_use]
    pub fn deletion_ratio(&self) -> f64 {
        if self.total_catalog_size == 0 {
            0.0
        } else {
            self.proposed_deletions as f64 / self.total_catalog_size as f64
        }
    }
}

fn remote_key(entry: &RemoteCatalogEntry) -> String {
    normalize_key(&entry.sku)
}

/// Entry a store row points at, if it exists and carries the row's key.
fn linked_entry<'a>(
    record: &CatalogRecord,
    remote_by_id: &BTreeMap<&RemoteEntryId, &'a RemoteCatalogEntry>,
) -> Option<&'a RemoteCatalogEntry> {
    record
        .remote_id
        .as_ref()
        .and_then(|id| remote_by_id.get(id).copied())
        .filter(|entry| remote_key(entry) == record.business_key())
}

/// Compare one snapshot of each source.
#[must_use]
pub fn analyze_snapshots(
    feed: &[CatalogRecord],
    stored: &[CatalogRecord],
    remote: &[RemoteCatalogEntry],
    max_deletion_ratio: f64,
) -> DiscrepancyReport {
    let feed_keys: BTreeSet<String> = feed
        .iter()
        .map(|r| normalize_key(&r.tag_number))
        .filter(|k| !k.is_empty())
        .collect();

    let remote_by_id: BTreeMap<&RemoteEntryId, &RemoteCatalogEntry> =
        remote.iter().map(|e| (&e.id, e)).collect();
    let mut remote_by_key: BTreeMap<String, Vec<&RemoteCatalogEntry>> = BTreeMap::new();
    for entry in remote {
        remote_by_key.entry(remote_key(entry)).or_default().push(entry);
    }
    for group in remote_by_key.values_mut() {
        group.sort_by(|a, b| a.canonical_cmp(b));
    }

    let stored: Vec<&CatalogRecord> = stored
        .iter()
        .filter(|r| !r.business_key().is_empty())
        .collect();

    let mut referenced: BTreeSet<RemoteEntryId> = stored
        .iter()
        .filter_map(|r| linked_entry(r, &remote_by_id))
        .map(|entry| entry.id.clone())
        .collect();

    let mut extra_in_store = Vec::new();
    let mut id_mismatches = Vec::new();
    let mut image_count_mismatches = Vec::new();
    let mut invariant_breaches = Vec::new();

    for record in &stored {
        let key = record.business_key();
        match linked_entry(record, &remote_by_id) {
            Some(entry) => {
                let expected = draft::images(record).len();
                let actual = entry.images.len();
                if expected != actual {
                    image_count_mismatches.push(ImageCountMismatch {
                        business_key: key.to_string(),
                        remote_id: entry.id.clone(),
                        expected,
                        actual,
                    });
                }
                let level = InventoryPolicy::target_level(&record.status);
                let breach = if entry.variant_count() != 1 {
                    Some(format!("{} variants", entry.variant_count()))
                } else {
                    InventoryPolicy::check_invariant(entry, Some(level))
                        .err()
                        .map(|e| e.to_string())
                };
                if let Some(message) = breach {
                    invariant_breaches.push(InvariantBreach {
                        business_key: key.to_string(),
                        remote_id: entry.id.clone(),
                        message,
                    });
                }
            }
            None => {
                let lookup = remote_by_key
                    .get(key)
                    .and_then(|group| group.iter().find(|e| !referenced.contains(&e.id)));
                match (lookup, &record.remote_id) {
                    (Some(entry), stored_remote_id) => {
                        referenced.insert(entry.id.clone());
                        id_mismatches.push(IdMismatch {
                            business_key: key.to_string(),
                            stored_remote_id: stored_remote_id.clone(),
                            remote_lookup_id: entry.id.clone(),
                        });
                    }
                    (None, Some(remote_id)) => extra_in_store.push(ExtraStore {
                        business_key: key.to_string(),
                        remote_id: Some(remote_id.clone()),
                        in_feed: feed_keys.contains(key),
                    }),
                    // Never published; the next sync run handles it.
                    (None, None) => {}
                }
            }
        }
    }

    let mut extra_in_remote = Vec::new();
    let mut duplicate_keys = Vec::new();

    for (key, group) in &remote_by_key {
        let unreferenced: Vec<&RemoteCatalogEntry> = group
            .iter()
            .copied()
            .filter(|e| !referenced.contains(&e.id))
            .collect();
        if unreferenced.is_empty() {
            continue;
        }

        let canonical = group.iter().find(|e| referenced.contains(&e.id));
        match canonical {
            Some(canonical) => duplicate_keys.push(DuplicateKey {
                business_key: key.clone(),
                canonical: canonical.id.clone(),
                extras: unreferenced.iter().map(|e| e.id.clone()).collect(),
            }),
            None if !key.is_empty() && feed_keys.contains(key) => {
                let (first, rest) = unreferenced.split_at(1);
                extra_in_remote.push(ExtraRemote {
                    remote_id: first[0].id.clone(),
                    business_key: key.clone(),
                    in_feed: true,
                });
                if !rest.is_empty() {
                    duplicate_keys.push(DuplicateKey {
                        business_key: key.clone(),
                        canonical: first[0].id.clone(),
                        extras: rest.iter().map(|e| e.id.clone()).collect(),
                    });
                }
            }
            None => extra_in_remote.extend(unreferenced.iter().map(|e| ExtraRemote {
                remote_id: e.id.clone(),
                business_key: key.clone(),
                in_feed: false,
            })),
        }
    }

    let proposed_deletions = extra_in_remote.iter().filter(|e| !e.in_feed).count()
        + duplicate_keys.iter().map(|d| d.extras.len()).sum::<usize>()
        + extra_in_store.iter().filter(|e| !e.in_feed).count();
    let total_catalog_size = remote.len().max(stored.len());
    let exceeds_safety_threshold = total_catalog_size > 0
        && proposed_deletions as f64 / total_catalog_size as f64 > max_deletion_ratio;

    DiscrepancyReport {
        generated_at: Utc::now(),
        feed_size: feed.len(),
        store_size: stored.len(),
        remote_size: remote.len(),
        extra_in_remote,
        extra_in_store,
        id_mismatches,
        image_count_mismatches,
        duplicate_keys,
        invariant_breaches,
        proposed_deletions,
        total_catalog_size,
        max_deletion_ratio,
        exceeds_safety_threshold,
    }
}
