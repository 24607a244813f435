use crate::services::interactions::InteractionStore;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Relative change in mean/std of per-user interaction counts above which
/// drift is flagged. The comparison is strictly greater-than: a change of
/// exactly 10% does not flag.
const INTERACTION_DRIFT_THRESHOLD: f64 = 0.1;

/// L1 distance between normalized popularity histograms above which drift is
/// flagged, also strictly greater-than.
const POPULARITY_DRIFT_THRESHOLD: f64 = 0.2;

/// Summary statistics of one interaction snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub mean_user_interactions: f64,
    pub std_user_interactions: f64,
    pub total_users: usize,
    pub total_items: usize,
    /// Per-item interaction counts in ascending item-id order, so two
    /// snapshots compare position by position deterministically.
    pub popularity: Vec<f64>,
}

impl SnapshotStats {
    pub fn from_store(store: &InteractionStore) -> Self {
        let counts: Vec<f64> = store.users().map(|(_, items)| items.len() as f64).collect();

        let mean = if counts.is_empty() {
            0.0
        } else {
            counts.iter().sum::<f64>() / counts.len() as f64
        };
        let std = if counts.is_empty() {
            0.0
        } else {
            (counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / counts.len() as f64).sqrt()
        };

        let item_counts = store.item_interaction_counts();
        let mut item_ids: Vec<_> = item_counts.keys().copied().collect();
        item_ids.sort_unstable();
        let popularity = item_ids
            .iter()
            .map(|id| item_counts[id] as f64)
            .collect::<Vec<f64>>();

        Self {
            mean_user_interactions: mean,
            std_user_interactions: std,
            total_users: store.user_count(),
            total_items: item_ids.len(),
            popularity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionDrift {
    pub mean_drift: f64,
    pub std_drift: f64,
    pub drift_detected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularityDrift {
    pub score: f64,
    pub drift_detected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub user_interaction: InteractionDrift,
    pub popularity: PopularityDrift,
    pub drift_detected: bool,
}

/// Compares fresh interaction snapshots against one frozen baseline.
///
/// The detector never swaps its own baseline: `reset` is an explicit external
/// call made after retraining, under the same single-writer discipline as the
/// model swap.
#[derive(Debug, Clone)]
pub struct DriftDetector {
    baseline: SnapshotStats,
}

impl DriftDetector {
    pub fn new(baseline: &InteractionStore) -> Self {
        Self {
            baseline: SnapshotStats::from_store(baseline),
        }
    }

    pub fn baseline(&self) -> &SnapshotStats {
        &self.baseline
    }

    pub fn reset(&mut self, new_baseline: &InteractionStore) {
        self.baseline = SnapshotStats::from_store(new_baseline);
    }

    pub fn detect(&self, current: &InteractionStore) -> DriftReport {
        let current = SnapshotStats::from_store(current);

        let mean_drift = relative_change(
            self.baseline.mean_user_interactions,
            current.mean_user_interactions,
        );
        let std_drift = relative_change(
            self.baseline.std_user_interactions,
            current.std_user_interactions,
        );
        let user_interaction = InteractionDrift {
            mean_drift,
            std_drift,
            drift_detected: mean_drift > INTERACTION_DRIFT_THRESHOLD
                || std_drift > INTERACTION_DRIFT_THRESHOLD,
        };

        let score = popularity_divergence(&self.baseline.popularity, &current.popularity);
        let popularity = PopularityDrift {
            score,
            drift_detected: score > POPULARITY_DRIFT_THRESHOLD,
        };

        let drift_detected = user_interaction.drift_detected || popularity.drift_detected;
        if drift_detected {
            warn!(
                mean_drift,
                std_drift,
                popularity_score = score,
                "Data drift detected against baseline"
            );
        }

        DriftReport {
            user_interaction,
            popularity,
            drift_detected,
        }
    }
}

fn relative_change(baseline: f64, current: f64) -> f64 {
    if baseline > 0.0 {
        (current - baseline).abs() / baseline
    } else {
        0.0
    }
}

/// Sum of absolute differences between the two normalized histograms,
/// zero-padded to equal length.
fn popularity_divergence(baseline: &[f64], current: &[f64]) -> f64 {
    if baseline.is_empty() || current.is_empty() {
        return 0.0;
    }

    let baseline_total: f64 = baseline.iter().sum();
    let current_total: f64 = current.iter().sum();
    if baseline_total == 0.0 || current_total == 0.0 {
        return 0.0;
    }

    let len = baseline.len().max(current.len());
    (0..len)
        .map(|i| {
            let b = baseline.get(i).copied().unwrap_or(0.0) / baseline_total;
            let c = current.get(i).copied().unwrap_or(0.0) / current_total;
            (b - c).abs()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemId, UserId};
    use std::collections::HashMap;

    fn store(users: Vec<(UserId, Vec<ItemId>)>) -> InteractionStore {
        let by_user: HashMap<UserId, HashMap<ItemId, f64>> = users
            .into_iter()
            .map(|(u, items)| (u, items.into_iter().map(|i| (i, 1.0)).collect()))
            .collect();
        InteractionStore::from_map(by_user)
    }

    /// Store with `n` users each holding `count` interactions over disjoint
    /// items, giving mean = count and std = 0.
    fn uniform_store(n: u64, count: u64) -> InteractionStore {
        store(
            (0..n)
                .map(|u| (u, (0..count).map(|i| u * 1000 + i).collect()))
                .collect(),
        )
    }

    #[test]
    fn test_mean_shift_beyond_threshold_flags() {
        // Baseline mean 10.0, current mean 12.0 -> mean_drift 0.2.
        let detector = DriftDetector::new(&uniform_store(4, 10));
        let report = detector.detect(&uniform_store(4, 12));

        assert!((report.user_interaction.mean_drift - 0.2).abs() < 1e-12);
        assert!(report.user_interaction.drift_detected);
        assert!(report.drift_detected);
    }

    #[test]
    fn test_exactly_ten_percent_does_not_flag() {
        // The threshold comparison is strict: mean_drift of exactly 0.1 stays
        // unflagged.
        let detector = DriftDetector::new(&uniform_store(4, 10));
        let report = detector.detect(&uniform_store(4, 11));

        assert!((report.user_interaction.mean_drift - 0.1).abs() < 1e-12);
        assert!(!report.user_interaction.drift_detected);
    }

    #[test]
    fn test_identical_snapshot_reports_no_drift() {
        let baseline = store(vec![(1, vec![101, 102]), (2, vec![101, 103])]);
        let detector = DriftDetector::new(&baseline);

        let report = detector.detect(&baseline);

        assert_eq!(report.user_interaction.mean_drift, 0.0);
        assert_eq!(report.popularity.score, 0.0);
        assert!(!report.drift_detected);
    }

    #[test]
    fn test_popularity_shift_flags() {
        // Baseline: items evenly popular. Current: everything concentrates
        // on one item, which pushes L1 divergence above 0.2.
        let baseline = store(vec![
            (1, vec![101]),
            (2, vec![102]),
            (3, vec![103]),
            (4, vec![104]),
        ]);
        let current = store(vec![
            (1, vec![101]),
            (2, vec![101]),
            (3, vec![101]),
            (4, vec![101]),
        ]);
        let detector = DriftDetector::new(&baseline);

        let report = detector.detect(&current);

        assert!(report.popularity.score > 0.2);
        assert!(report.popularity.drift_detected);
    }

    #[test]
    fn test_reset_replaces_baseline() {
        let mut detector = DriftDetector::new(&uniform_store(4, 10));
        let drifted = uniform_store(4, 20);

        assert!(detector.detect(&drifted).drift_detected);

        detector.reset(&drifted);
        assert!(!detector.detect(&drifted).drift_detected);
        assert_eq!(detector.baseline().mean_user_interactions, 20.0);
    }

    #[test]
    fn test_empty_baseline_never_divides_by_zero() {
        let detector = DriftDetector::new(&store(vec![]));
        let report = detector.detect(&uniform_store(2, 5));

        assert_eq!(report.user_interaction.mean_drift, 0.0);
        assert!(!report.drift_detected);
    }
}
