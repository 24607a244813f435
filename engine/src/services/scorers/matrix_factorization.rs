use super::{rank_and_truncate, Scorer, TrainingData};
use crate::error::{AppError, Result};
use crate::models::{ItemId, UserId};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Learned interaction scorer: logistic matrix factorization trained by SGD
/// over positive interactions plus seeded negative samples.
///
/// The sampling seed is explicit and fixed up front, so two training runs
/// over the same data produce identical parameters, and inference is fully
/// deterministic.
pub struct MatrixFactorizationScorer {
    factors: usize,
    learning_rate: f64,
    regularization: f64,
    epochs: usize,
    seed: u64,
    state: Option<MfState>,
}

struct MfState {
    user_index: HashMap<UserId, usize>,
    item_ids: Vec<ItemId>,
    user_factors: Array2<f64>,
    item_factors: Array2<f64>,
    user_bias: Vec<f64>,
    item_bias: Vec<f64>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl MatrixFactorizationScorer {
    pub fn new(factors: usize, learning_rate: f64, epochs: usize, seed: u64) -> Self {
        Self {
            factors,
            learning_rate,
            regularization: 0.01,
            epochs,
            seed,
            state: None,
        }
    }

    /// Positive samples (label 1) for every stored interaction, plus one
    /// negative sample (label 0) per positive, rejection-sampled away from
    /// the user's seen set.
    fn build_samples(
        data: &TrainingData,
        user_index: &HashMap<UserId, usize>,
        item_index: &HashMap<ItemId, usize>,
        item_ids: &[ItemId],
        rng: &mut StdRng,
    ) -> Vec<(usize, usize, f64)> {
        let mut samples = Vec::new();

        let mut user_ids: Vec<UserId> = user_index.keys().copied().collect();
        user_ids.sort_unstable();

        for user_id in user_ids {
            let Some(seen) = data.interactions.user_items(user_id) else {
                continue;
            };
            let u = user_index[&user_id];

            let mut seen_ids: Vec<ItemId> = seen.keys().copied().collect();
            seen_ids.sort_unstable();

            for item_id in seen_ids {
                samples.push((u, item_index[&item_id], 1.0));

                // A user who has seen the whole catalog has no negatives.
                if seen.len() >= item_ids.len() {
                    continue;
                }
                let mut negative = item_ids[rng.gen_range(0..item_ids.len())];
                while seen.contains_key(&negative) {
                    negative = item_ids[rng.gen_range(0..item_ids.len())];
                }
                samples.push((u, item_index[&negative], 0.0));
            }
        }

        samples
    }
}

impl Scorer for MatrixFactorizationScorer {
    fn name(&self) -> &'static str {
        "matrix_factorization"
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

        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut user_factors = Array2::zeros((user_ids.len(), self.factors));
        let mut item_factors = Array2::zeros((item_ids.len(), self.factors));
        for value in user_factors.iter_mut().chain(item_factors.iter_mut()) {
            *value = (rng.gen::<f64>() - 0.5) * 0.1;
        }
        let mut user_bias = vec![0.0; user_ids.len()];
        let mut item_bias = vec![0.0; item_ids.len()];

        let mut samples =
            Self::build_samples(data, &user_index, &item_index, &item_ids, &mut rng);

        for _epoch in 0..self.epochs {
            samples.shuffle(&mut rng);
            for &(u, i, label) in &samples {
                let prediction = sigmoid(
                    user_factors.row(u).dot(&item_factors.row(i))
                        + user_bias[u]
                        + item_bias[i],
                );
                let error = prediction - label;

                for f in 0..self.factors {
                    let uf = user_factors[[u, f]];
                    let vf = item_factors[[i, f]];
                    user_factors[[u, f]] -=
                        self.learning_rate * (error * vf + self.regularization * uf);
                    item_factors[[i, f]] -=
                        self.learning_rate * (error * uf + self.regularization * vf);
                }
                user_bias[u] -= self.learning_rate * error;
                item_bias[i] -= self.learning_rate * error;
            }
        }

        info!(
            "Matrix factorization trained: {} users, {} items, {} factors, seed {}",
            user_ids.len(),
            item_ids.len(),
            self.factors,
            self.seed
        );

        self.state = Some(MfState {
            user_index,
            item_ids,
            user_factors,
            item_factors,
            user_bias,
            item_bias,
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
            .ok_or_else(|| AppError::NotTrained("matrix factorization scorer".to_string()))?;

        let Some(&u) = state.user_index.get(&user_id) else {
            return Ok(Vec::new());
        };

        let mut scored = Vec::new();
        for (i, item_id) in state.item_ids.iter().enumerate() {
            if exclude.contains(item_id) {
                continue;
            }
            let prediction = sigmoid(
                state.user_factors.row(u).dot(&state.item_factors.row(i))
                    + state.user_bias[u]
                    + state.item_bias[i],
            );
            scored.push((*item_id, prediction));
        }

        Ok(rank_and_truncate(scored, k))
    }

    fn is_trained(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::interactions::InteractionStore;

    fn training_data() -> TrainingData {
        let by_user = [
            (1u64, [(101u64, 5.0), (102, 4.0)].into_iter().collect()),
            (2, [(101, 4.0), (103, 4.0)].into_iter().collect()),
            (3, [(102, 3.0), (103, 5.0), (104, 2.0)].into_iter().collect()),
        ]
        .into_iter()
        .collect();
        TrainingData {
            interactions: InteractionStore::from_map(by_user),
            ..Default::default()
        }
    }

    #[test]
    fn test_training_is_reproducible_for_fixed_seed() {
        let data = training_data();

        let mut a = MatrixFactorizationScorer::new(8, 0.05, 20, 42);
        let mut b = MatrixFactorizationScorer::new(8, 0.05, 20, 42);
        a.train(&data).unwrap();
        b.train(&data).unwrap();

        let exclude: HashSet<ItemId> = [101].into_iter().collect();
        assert_eq!(a.score(1, &exclude, 5).unwrap(), b.score(1, &exclude, 5).unwrap());
    }

    #[test]
    fn test_unknown_user_returns_empty() {
        let mut scorer = MatrixFactorizationScorer::new(4, 0.05, 5, 42);
        scorer.train(&training_data()).unwrap();

        assert!(scorer.score(999, &HashSet::new(), 5).unwrap().is_empty());
    }

    #[test]
    fn test_exclusion_and_ordering_hold() {
        let mut scorer = MatrixFactorizationScorer::new(4, 0.05, 10, 42);
        scorer.train(&training_data()).unwrap();

        let exclude: HashSet<ItemId> = [101, 102].into_iter().collect();
        let recs = scorer.score(1, &exclude, 10).unwrap();

        assert!(recs.iter().all(|(item, _)| !exclude.contains(item)));
        for pair in recs.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn test_scores_are_probabilities() {
        let mut scorer = MatrixFactorizationScorer::new(4, 0.05, 10, 42);
        scorer.train(&training_data()).unwrap();

        let recs = scorer.score(2, &HashSet::new(), 10).unwrap();
        assert!(recs.iter().all(|(_, s)| (0.0..=1.0).contains(s)));
    }
}
