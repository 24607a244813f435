use super::{rank_and_truncate, Scorer, TrainingData};
use crate::error::{AppError, Result};
use crate::models::{ItemId, UserId};
use ndarray::Array2;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// User-based collaborative filtering over a dense user x item matrix.
///
/// Training builds the matrix and a user x user cosine-similarity matrix with
/// a zeroed diagonal. Scoring ranks the target user's neighbors by
/// similarity, keeps at most `max_neighbors` above `min_similarity`, and
/// accumulates `similarity * rating` for every item a neighbor rated
/// positively that the caller has not excluded.
pub struct CollaborativeScorer {
    min_similarity: f64,
    max_neighbors: usize,
    state: Option<CfState>,
}

struct CfState {
    user_index: HashMap<UserId, usize>,
    item_ids: Vec<ItemId>,
    matrix: Array2<f64>,
    similarity: Array2<f64>,
}

impl CollaborativeScorer {
    pub fn new(min_similarity: f64, max_neighbors: usize) -> Self {
        Self {
            min_similarity,
            max_neighbors,
            state: None,
        }
    }

    /// Cosine similarity of every pair of matrix rows; 0 (not undefined)
    /// when either row norm is 0, and 0 on the diagonal.
    fn user_similarity(matrix: &Array2<f64>) -> Array2<f64> {
        let n_users = matrix.nrows();
        let norms: Vec<f64> = (0..n_users)
            .map(|i| matrix.row(i).dot(&matrix.row(i)).sqrt())
            .collect();

        let mut similarity = matrix.dot(&matrix.t());
        for i in 0..n_users {
            for j in 0..n_users {
                if i == j || norms[i] == 0.0 || norms[j] == 0.0 {
                    similarity[[i, j]] = 0.0;
                } else {
                    similarity[[i, j]] /= norms[i] * norms[j];
                }
            }
        }
        similarity
    }
}

impl Scorer for CollaborativeScorer {
    fn name(&self) -> &'static str {
        "collaborative"
    }

    fn train(&mut self, data: &TrainingData) -> Result<()> {
        let store = &data.interactions;
        if store.is_empty() {
            return Err(AppError::TrainingError(
                "no interactions to train on".to_string(),
            ));
        }

        let user_ids = store.sorted_user_ids();
        let item_ids = store.sorted_item_ids();
        let user_index: HashMap<UserId, usize> = user_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();
        let item_index: HashMap<ItemId, usize> = item_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        let mut matrix = Array2::zeros((user_ids.len(), item_ids.len()));
        for (user_id, items) in store.users() {
            let row = user_index[user_id];
            for (item_id, weight) in items {
                matrix[[row, item_index[item_id]]] = *weight;
            }
        }

        let similarity = Self::user_similarity(&matrix);

        info!(
            "Collaborative scorer trained: {} users x {} items",
            user_ids.len(),
            item_ids.len()
        );

        self.state = Some(CfState {
            user_index,
            item_ids,
            matrix,
            similarity,
        });
        Ok(())
    }

    fn score(
        &self,
        user_id: UserId,
        exclude: &HashSet<ItemId>,
        k: usize,
    ) -> Result<Vec<(ItemId, f64)>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| AppError::NotTrained("collaborative scorer".to_string()))?;

        // Cold start: a user absent from training contributes nothing.
        let Some(&user_idx) = state.user_index.get(&user_id) else {
            return Ok(Vec::new());
        };

        let similarities = state.similarity.row(user_idx);
        let mut neighbors: Vec<(usize, f64)> = similarities
            .iter()
            .enumerate()
            .filter(|(idx, sim)| *idx != user_idx && **sim > self.min_similarity)
            .map(|(idx, sim)| (idx, *sim))
            .collect();
        neighbors.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        neighbors.truncate(self.max_neighbors);

        let mut item_scores: HashMap<ItemId, f64> = HashMap::new();
        for (neighbor_idx, similarity) in neighbors {
            let ratings = state.matrix.row(neighbor_idx);
            for (item_idx, rating) in ratings.iter().enumerate() {
                if *rating > 0.0 {
                    let item_id = state.item_ids[item_idx];
                    if !exclude.contains(&item_id) {
                        *item_scores.entry(item_id).or_insert(0.0) += similarity * rating;
                    }
                }
            }
        }

        Ok(rank_and_truncate(item_scores.into_iter().collect(), k))
    }

    fn is_trained(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::interactions::InteractionStore;

    fn trained(interactions: Vec<(UserId, Vec<(ItemId, f64)>)>) -> CollaborativeScorer {
        let by_user = interactions
            .into_iter()
            .map(|(u, items)| (u, items.into_iter().collect()))
            .collect();
        let data = TrainingData {
            interactions: InteractionStore::from_map(by_user),
            ..Default::default()
        };
        let mut scorer = CollaborativeScorer::new(0.1, 50);
        scorer.train(&data).unwrap();
        scorer
    }

    #[test]
    fn test_score_before_train_is_not_trained() {
        let scorer = CollaborativeScorer::new(0.1, 50);
        let err = scorer.score(1, &HashSet::new(), 5).unwrap_err();
        assert!(matches!(err, AppError::NotTrained(_)));
    }

    #[test]
    fn test_unknown_user_returns_empty() {
        let scorer = trained(vec![(1, vec![(101, 5.0)]), (2, vec![(101, 4.0)])]);
        assert!(scorer.score(999, &HashSet::new(), 5).unwrap().is_empty());
    }

    #[test]
    fn test_excluded_items_never_appear() {
        let scorer = trained(vec![
            (1, vec![(101, 5.0), (102, 4.0)]),
            (2, vec![(101, 4.0), (103, 4.0)]),
        ]);

        let exclude: HashSet<ItemId> = [101].into_iter().collect();
        let recs = scorer.score(1, &exclude, 5).unwrap();

        assert!(!recs.is_empty());
        assert!(recs.iter().all(|(item, _)| *item != 101));
    }

    #[test]
    fn test_scores_non_increasing() {
        let scorer = trained(vec![
            (1, vec![(101, 5.0), (102, 4.0)]),
            (2, vec![(101, 4.0), (103, 4.0), (104, 1.0)]),
            (3, vec![(102, 3.0), (104, 5.0)]),
        ]);

        let recs = scorer.score(1, &[101, 102].into_iter().collect(), 10).unwrap();

        for pair in recs.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn test_neighbor_scores_accumulate_similarity_times_rating() {
        // Users 1 and 2 share item 101, so user 2 is a neighbor of user 1;
        // item 103 must be scored with user 2's similarity times 4.0.
        let scorer = trained(vec![
            (1, vec![(101, 5.0), (102, 4.0)]),
            (2, vec![(101, 4.0), (103, 4.0)]),
        ]);

        let recs = scorer.score(1, &[101].into_iter().collect(), 5).unwrap();
        let items: Vec<ItemId> = recs.iter().map(|(i, _)| *i).collect();

        assert!(items.contains(&102) || items.contains(&103));
        let state = scorer.state.as_ref().unwrap();
        let sim = state.similarity[[0, 1]];
        let score_103 = recs.iter().find(|(i, _)| *i == 103).unwrap().1;
        assert!((score_103 - sim * 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_norm_rows_have_zero_similarity() {
        let matrix =
            Array2::from_shape_vec((2, 2), vec![0.0, 0.0, 1.0, 2.0]).unwrap();
        let sim = CollaborativeScorer::user_similarity(&matrix);

        assert_eq!(sim[[0, 1]], 0.0);
        assert_eq!(sim[[1, 0]], 0.0);
        assert_eq!(sim[[1, 1]], 0.0); // diagonal is always zeroed
    }
}
