mod collaborative;
mod content_based;
mod matrix_factorization;

use crate::error::Result;
use crate::models::{ItemId, UserId};
use crate::services::catalog::ItemCatalog;
use crate::services::interactions::InteractionStore;
use std::collections::HashSet;

pub use collaborative::CollaborativeScorer;
pub use content_based::ContentScorer;
pub use matrix_factorization::MatrixFactorizationScorer;

/// Everything a scorer may look at during training. Built once per training
/// cycle and held immutable for its duration.
#[derive(Debug, Clone, Default)]
pub struct TrainingData {
    pub interactions: InteractionStore,
    pub catalog: ItemCatalog,
}

/// Contract every sub-model must satisfy to participate in the ensemble.
///
/// `score` must be deterministic given fixed trained parameters, must return
/// scores in non-increasing order with ties broken by ascending item id, must
/// never emit an item from the exclusion set, and must return an empty list
/// (not an error) for users or items absent from training.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn train(&mut self, data: &TrainingData) -> Result<()>;

    fn score(
        &self,
        user_id: UserId,
        exclude: &HashSet<ItemId>,
        k: usize,
    ) -> Result<Vec<(ItemId, f64)>>;

    fn is_trained(&self) -> bool;
}

/// Shared final ordering for every scorer: score descending, item id
/// ascending on ties, truncated to k.
pub(crate) fn rank_and_truncate(mut scored: Vec<(ItemId, f64)>, k: usize) -> Vec<(ItemId, f64)> {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_orders_by_score_then_id() {
        let ranked = rank_and_truncate(
            vec![(30, 0.5), (10, 0.9), (20, 0.5), (40, 0.1)],
            3,
        );

        assert_eq!(ranked, vec![(10, 0.9), (20, 0.5), (30, 0.5)]);
    }

    #[test]
    fn test_rank_truncates_to_k() {
        let ranked = rank_and_truncate(vec![(1, 1.0), (2, 0.5)], 0);
        assert!(ranked.is_empty());
    }
}
