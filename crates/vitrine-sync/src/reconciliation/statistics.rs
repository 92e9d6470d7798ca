//! Run statistics for reconciliation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::discrepancy::{DiscrepancyReport, DiscrepancyType};
use super::remediation::{RemediationAction, RemediationResult};

/// Statistics for a reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    #[serde(default)]
    pub remote_total: usize,
    #[serde(default)]
    pub store_total: usize,
    #[serde(default)]
    pub feed_total: usize,
    /// Total discrepancies found.
    #[serde(default)]
    pub discrepancies_found: usize,
    /// Discrepancies broken down by type.
    #[serde(default)]
    pub discrepancies_by_type: HashMap<String, usize>,
    /// Successful actions broken down by type.
    #[serde(default)]
    pub actions_taken: HashMap<String, usize>,
    /// Failed actions broken down by type.
    #[serde(default)]
    pub actions_failed: HashMap<String, usize>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl RunStatistics {
    /// Create new empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the statistics from an analysis.
    #[must_use]
    pub fn from_report(report: &DiscrepancyReport) -> Self {
        let counts = report.counts();
        Self {
            remote_total: report.remote_size,
            store_total: report.store_size,
            feed_total: report.feed_size,
            discrepancies_found: counts.values().sum(),
            discrepancies_by_type: counts
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(kind, count)| (kind.to_string(), count))
                .collect(),
            ..Self::default()
        }
    }

    /// Record one executed action.
    pub fn record_action(&mut self, result: &RemediationResult) {
        let bucket = if result.is_success() {
            &mut self.actions_taken
        } else {
            &mut self.actions_failed
        };
        *bucket.entry(result.action.to_string()).or_insert(0) += 1;
    }

    /// Get count for a specific discrepancy type.
    #[must_use]
    pub fn discrepancy_count(&self, discrepancy_type: DiscrepancyType) -> usize {
        self.discrepancies_by_type
            .get(discrepancy_type.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Get successful count for a specific action type.
    #[must_use]
    pub fn action_count(&self, action: RemediationAction) -> usize {
        self.actions_taken.get(action.as_str()).copied().unwrap_or(0)
    }

    /// Merge with another statistics instance.
    pub fn merge(&mut self, other: &RunStatistics) {
        self.discrepancies_found += other.discrepancies_found;
        for (key, value) in &other.discrepancies_by_type {
            *self.discrepancies_by_type.entry(key.clone()).or_insert(0) += value;
        }
        for (key, value) in &other.actions_taken {
            *self.actions_taken.entry(key.clone()).or_insert(0) += value;
        }
        for (key, value) in &other.actions_failed {
            *self.actions_failed.entry(key.clone()).or_insert(0) += value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::discrepancy::analyze_snapshots;
    use vitrine_core::CatalogRecord;

    #[test]
    fn test_record_action_splits_success_and_failure() {
        let mut stats = RunStatistics::new();
        stats.record_action(&RemediationResult::success(
            RemediationAction::DeleteRemote,
            "A",
            None,
            false,
        ));
        stats.record_action(&RemediationResult::failure(
            RemediationAction::DeleteRemote,
            "B",
            None,
            "boom".to_string(),
            false,
        ));
        assert_eq!(stats.action_count(RemediationAction::DeleteRemote), 1);
        assert_eq!(stats.actions_failed.get("delete_remote"), Some(&1));
    }

    #[test]
    fn test_from_report_counts_nonzero_types() {
        let mut stored = CatalogRecord::new("A");
        stored.remote_id = Some("gid://catalog/Product/1".into());
        let report = analyze_snapshots(&[], &[stored], &[], 1.0);

        let stats = RunStatistics::from_report(&report);
        assert_eq!(stats.discrepancies_found, 1);
        assert_eq!(stats.discrepancy_count(DiscrepancyType::ExtraInStore), 1);
        assert_eq!(stats.discrepancy_count(DiscrepancyType::IdMismatch), 0);
        assert_eq!(stats.discrepancies_by_type.len(), 1);
    }

    #[test]
    fn test_merge() {
        let mut a = RunStatistics::new();
        a.discrepancies_found = 2;
        a.actions_taken.insert("link".to_string(), 1);
        let mut b = RunStatistics::new();
        b.discrepancies_found = 3;
        b.actions_taken.insert("link".to_string(), 2);

        a.merge(&b);
        assert_eq!(a.discrepancies_found, 5);
        assert_eq!(a.action_count(RemediationAction::Link), 3);
    }
}
