use super::{rank_and_truncate, Scorer, TrainingData};
use crate::error::{AppError, Result};
use crate::models::{ItemId, UserId};
use crate::services::features::FeatureEncoder;
use ndarray::{Array1, Array2};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Feature-similarity scorer: ranks items by cosine similarity between the
/// user's profile vector (mean feature vector of the history items) and every
/// item's standardized feature vector.
pub struct ContentScorer {
    similarity_threshold: f64,
    state: Option<CbState>,
}

struct CbState {
    item_ids: Vec<ItemId>,
    item_index: HashMap<ItemId, usize>,
    matrix: Array2<f64>,
    #[allow(dead_code)]
    encoder: FeatureEncoder,
}

impl ContentScorer {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
            state: None,
        }
    }

    /// Mean feature vector over the known history items; the zero vector when
    /// the history is empty or entirely unknown, which correctly scores every
    /// item at 0 ("no preference signal").
    fn profile_vector(state: &CbState, history: &HashSet<ItemId>) -> Array1<f64> {
        let mut profile = Array1::zeros(state.matrix.ncols());
        let mut known = 0usize;

        for item_id in history {
            if let Some(&idx) = state.item_index.get(item_id) {
                profile += &state.matrix.row(idx);
                known += 1;
            }
        }

        if known > 0 {
            profile /= known as f64;
        }
        profile
    }

    fn cosine(a: &Array1<f64>, b: ndarray::ArrayView1<f64>) -> f64 {
        let norm_a = a.dot(a).sqrt();
        let norm_b = b.dot(&b).sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        a.dot(&b) / (norm_a * norm_b)
    }
}

impl Scorer for ContentScorer {
    fn name(&self) -> &'static str {
        "content_based"
    }

    fn train(&mut self, data: &TrainingData) -> Result<()> {
        if data.catalog.is_empty() {
            return Err(AppError::TrainingError(
                "no item features to train on".to_string(),
            ));
        }

        let item_ids = data.catalog.sorted_item_ids();
        let item_index: HashMap<ItemId, usize> = item_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();
        let (encoder, matrix) = FeatureEncoder::fit(&data.catalog, &item_ids);

        info!(
            "Content scorer trained: {} items, {} feature dims, {} categories",
            item_ids.len(),
            matrix.ncols(),
            encoder.category_vocab().len()
        );

        self.state = Some(CbState {
            item_ids,
            item_index,
            matrix,
            encoder,
        });
        Ok(())
    }

    fn score(
        &self,
        _user_id: UserId,
        exclude: &HashSet<ItemId>,
        k: usize,
    ) -> Result<Vec<(ItemId, f64)>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| AppError::NotTrained("content scorer".to_string()))?;

        let profile = Self::profile_vector(state, exclude);

        let mut scored = Vec::new();
        for (idx, item_id) in state.item_ids.iter().enumerate() {
            if exclude.contains(item_id) {
                continue;
            }
            let similarity = Self::cosine(&profile, state.matrix.row(idx));
            if similarity > self.similarity_threshold {
                scored.push((*item_id, similarity));
            }
        }

        Ok(rank_and_truncate(scored, k))
    }

    fn is_trained(&self) -> bool {
        self.state.is_some()
    }
}
