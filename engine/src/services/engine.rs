use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::models::{
    ItemId, RankingMetrics, ScoredItem, ScorerFailure, TrainingReport, UserId,
};
use crate::services::blender::HybridBlender;
use crate::services::evaluation::{leave_last_out, EvaluationHarness};
use crate::services::interactions::InteractionStore;
use crate::services::scorers::{
    CollaborativeScorer, ContentScorer, MatrixFactorizationScorer, Scorer, TrainingData,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, warn};

/// Name reserved for the blended ensemble in prediction requests and
/// evaluation reports.
pub const HYBRID_MODEL: &str = "hybrid";

/// The hybrid recommendation engine: an explicit registry of scorers plus the
/// blender that fuses their outputs.
///
/// An engine instance is immutable once trained. Retraining builds a fresh
/// instance which the serving layer swaps in atomically, so in-flight
/// predictions keep reading the old parameters.
pub struct HybridEngine {
    // BTreeMap keeps scorer iteration order deterministic.
    scorers: BTreeMap<String, Box<dyn Scorer>>,
    blender: HybridBlender,
    data: TrainingData,
    evaluation_k: usize,
}

impl HybridEngine {
    /// Build an untrained engine with the standard three scorers registered.
    pub fn new(config: &EngineConfig) -> Self {
        let mut scorers: BTreeMap<String, Box<dyn Scorer>> = BTreeMap::new();
        for scorer in [
            Box::new(CollaborativeScorer::new(
                config.min_similarity,
                config.max_neighbors,
            )) as Box<dyn Scorer>,
            Box::new(ContentScorer::new(config.similarity_threshold)),
            Box::new(MatrixFactorizationScorer::new(
                config.mf_factors,
                config.mf_learning_rate,
                config.mf_epochs,
                config.mf_seed,
            )),
        ] {
            scorers.insert(scorer.name().to_string(), scorer);
        }

        Self {
            scorers,
            blender: HybridBlender::new(config.model_weights.clone()),
            data: TrainingData::default(),
            evaluation_k: config.evaluation_k,
        }
    }

    /// Engine with a caller-supplied registry, used by tests and by callers
    /// plugging in their own learned scorer.
    pub fn with_scorers(
        scorers: Vec<Box<dyn Scorer>>,
        weights: HashMap<String, f64>,
        evaluation_k: usize,
    ) -> Self {
        Self {
            scorers: scorers
                .into_iter()
                .map(|s| (s.name().to_string(), s))
                .collect(),
            blender: HybridBlender::new(weights),
            data: TrainingData::default(),
            evaluation_k,
        }
    }

    /// Train every registered scorer over the data. A scorer failure is
    /// recorded and logged, never fatal: training reports partial success.
    pub fn train(&mut self, data: TrainingData, dropped_records: usize) -> TrainingReport {
        let mut trained = Vec::new();
        let mut failed = Vec::new();

        for (name, scorer) in self.scorers.iter_mut() {
            match scorer.train(&data) {
                Ok(()) => {
                    info!("Scorer {} trained", name);
                    trained.push(name.clone());
                }
                Err(err) => {
                    warn!("Scorer {} training failed: {}", name, err);
                    failed.push(ScorerFailure {
                        scorer: name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let report = TrainingReport {
            trained,
            failed,
            dropped_records,
            user_count: data.interactions.user_count(),
            item_count: data.catalog.len(),
            trained_at: Utc::now(),
        };
        self.data = data;
        report
    }

    pub fn is_trained(&self) -> bool {
        self.scorers.values().any(|s| s.is_trained())
    }

    pub fn trained_scorer_names(&self) -> Vec<String> {
        self.scorers
            .iter()
            .filter(|(_, s)| s.is_trained())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn interactions(&self) -> &InteractionStore {
        &self.data.interactions
    }

    /// Run every trained scorer for the user and collect their outputs.
    /// Each scorer is asked for 2k candidates so the blend has some slack
    /// before truncation. A scorer error degrades to an empty contribution.
    fn scorer_outputs(
        &self,
        user_id: UserId,
        exclude: &HashSet<ItemId>,
        k: usize,
    ) -> HashMap<String, Vec<(ItemId, f64)>> {
        let mut outputs = HashMap::new();
        for (name, scorer) in &self.scorers {
            if !scorer.is_trained() {
                continue;
            }
            match scorer.score(user_id, exclude, k.saturating_mul(2)) {
                Ok(list) => {
                    outputs.insert(name.clone(), list);
                }
                Err(err) => {
                    warn!("Scorer {} failed during scoring: {}", name, err);
                    outputs.insert(name.clone(), Vec::new());
                }
            }
        }
        outputs
    }

    /// Produce the blended (or single-model) recommendation list.
    ///
    /// Unknown users and empty histories are valid and produce a best-effort,
    /// possibly empty, list. Only predicting on a fully untrained engine is
    /// an error.
    pub fn predict(
        &self,
        user_id: UserId,
        history: &[ItemId],
        k: usize,
        model_name: Option<&str>,
    ) -> Result<Vec<ScoredItem>> {
        if !self.is_trained() {
            return Err(AppError::NotTrained("no scorer has been trained".to_string()));
        }

        let exclude: HashSet<ItemId> = history.iter().copied().collect();

        let ranked = match model_name {
            None | Some(HYBRID_MODEL) => {
                let outputs = self.scorer_outputs(user_id, &exclude, k);
                self.blender.combine(&outputs, k)
            }
            Some(name) => {
                let scorer = self
                    .scorers
                    .get(name)
                    .ok_or_else(|| AppError::NotFound(format!("unknown model '{}'", name)))?;
                if !scorer.is_trained() {
                    return Err(AppError::NotTrained(name.to_string()));
                }
                scorer.score(user_id, &exclude, k)?
            }
        };

        Ok(ranked
            .into_iter()
            .map(|(item_id, score)| ScoredItem {
                item_id,
                score,
                explanation: Some(explanation_for(score).to_string()),
            })
            .collect())
    }

    /// Offline evaluation over a held-out split: metric suite per trained
    /// scorer plus the blended ensemble. A scorer whose evaluation fails
    /// contributes an empty metrics entry instead of aborting.
    pub fn evaluate(&self, test: &InteractionStore) -> Result<HashMap<String, RankingMetrics>> {
        if !self.is_trained() {
            return Err(AppError::NotTrained("no scorer has been trained".to_string()));
        }

        let cases = leave_last_out(test);
        let harness = EvaluationHarness::new(self.evaluation_k);
        let mut results = HashMap::new();

        for (name, scorer) in &self.scorers {
            if !scorer.is_trained() {
                continue;
            }
            let metrics = match harness.evaluate_scorer(scorer.as_ref(), &cases, &self.data.catalog)
            {
                Ok(metrics) => metrics,
                Err(err) => {
                    warn!("Scorer {} evaluation failed: {}", name, err);
                    RankingMetrics::default()
                }
            };
            results.insert(name.clone(), metrics);
        }

        let blended = harness.evaluate_with(&cases, &self.data.catalog, |case| {
            let outputs = self.scorer_outputs(case.user_id, &case.history, self.evaluation_k);
            Ok(self.blender.combine(&outputs, self.evaluation_k))
        })?;
        results.insert(HYBRID_MODEL.to_string(), blended);

        Ok(results)
    }
}

/// Presentational explanation bands on the blended score. Not part of the
/// ranking contract.
pub fn explanation_for(score: f64) -> &'static str {
    if score > 0.8 {
        "Highly recommended based on your activity"
    } else if score > 0.6 {
        "Popular among similar users"
    } else if score > 0.4 {
        "Matches your interests"
    } else {
        "You might also like this"
    }
}
