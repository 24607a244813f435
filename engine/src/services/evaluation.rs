use crate::error::Result;
use crate::models::{ItemId, RankingMetrics, UserId};
use crate::services::catalog::ItemCatalog;
use crate::services::interactions::InteractionStore;
use crate::services::metrics;
use crate::services::scorers::Scorer;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// One offline evaluation case: the user's history goes to the scorer, the
/// held-out items form the ground-truth relevant set.
#[derive(Debug, Clone)]
pub struct EvalCase {
    pub user_id: UserId,
    pub history: HashSet<ItemId>,
    pub relevant: HashSet<ItemId>,
}

/// Seeded per-user holdout split. For each user with more than one
/// interaction, `test_ratio` of their items (at least one) is sampled into
/// the test store; single-interaction users stay entirely in train.
pub fn split_store(
    store: &InteractionStore,
    test_ratio: f64,
    seed: u64,
) -> (InteractionStore, InteractionStore) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train: HashMap<UserId, HashMap<ItemId, f64>> = HashMap::new();
    let mut test: HashMap<UserId, HashMap<ItemId, f64>> = HashMap::new();

    for user_id in store.sorted_user_ids() {
        let items = store.user_items(user_id).cloned().unwrap_or_default();
        if items.len() < 2 {
            train.insert(user_id, items);
            continue;
        }

        let mut item_ids: Vec<ItemId> = items.keys().copied().collect();
        item_ids.sort_unstable();
        let test_size = ((item_ids.len() as f64 * test_ratio) as usize).max(1);
        let test_indices: HashSet<usize> =
            sample(&mut rng, item_ids.len(), test_size).into_iter().collect();

        let mut train_items = HashMap::new();
        let mut test_items = HashMap::new();
        for (i, item_id) in item_ids.into_iter().enumerate() {
            let weight = items[&item_id];
            if test_indices.contains(&i) {
                test_items.insert(item_id, weight);
            } else {
                train_items.insert(item_id, weight);
            }
        }
        if !train_items.is_empty() {
            train.insert(user_id, train_items);
        }
        if !test_items.is_empty() {
            test.insert(user_id, test_items);
        }
    }

    info!(
        "Split interactions: {} train users, {} test users",
        train.len(),
        test.len()
    );

    (
        InteractionStore::from_map(train),
        InteractionStore::from_map(test),
    )
}

/// Leave-last-out cases over a held-out store: each user's last item (by
/// ascending item id, for determinism) becomes the relevant set, the rest
/// the history.
pub fn leave_last_out(test: &InteractionStore) -> Vec<EvalCase> {
    let mut cases = Vec::new();
    for user_id in test.sorted_user_ids() {
        let Some(items) = test.user_items(user_id) else {
            continue;
        };
        if items.len() < 2 {
            continue;
        }
        let mut item_ids: Vec<ItemId> = items.keys().copied().collect();
        item_ids.sort_unstable();
        let held_out = item_ids.pop().expect("at least two items");
        cases.push(EvalCase {
            user_id,
            history: item_ids.into_iter().collect(),
            relevant: [held_out].into_iter().collect(),
        });
    }
    cases
}

/// Averages the metric suite over evaluation cases for anything that can
/// produce a ranked list.
pub struct EvaluationHarness {
    k: usize,
}

impl EvaluationHarness {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn evaluate_scorer(
        &self,
        scorer: &dyn Scorer,
        cases: &[EvalCase],
        catalog: &ItemCatalog,
    ) -> Result<RankingMetrics> {
        self.evaluate_with(cases, catalog, |case| {
            scorer.score(case.user_id, &case.history, self.k)
        })
    }

    /// Evaluate any list producer (a single scorer or the full blend) over
    /// the cases, averaging per-user metrics.
    pub fn evaluate_with<F>(
        &self,
        cases: &[EvalCase],
        catalog: &ItemCatalog,
        mut produce: F,
    ) -> Result<RankingMetrics>
    where
        F: FnMut(&EvalCase) -> Result<Vec<(ItemId, f64)>>,
    {
        let mut totals = RankingMetrics::default();
        let mut lists = Vec::with_capacity(cases.len());

        for case in cases {
            let recommendations = produce(case)?;

            totals.precision += metrics::precision_at_k(&recommendations, &case.relevant, self.k);
            totals.recall += metrics::recall_at_k(&recommendations, &case.relevant, self.k);
            totals.ndcg += metrics::ndcg_at_k(&recommendations, &case.relevant, self.k);
            totals.map += metrics::map_at_k(&recommendations, &case.relevant, self.k);
            totals.diversity += metrics::diversity(&recommendations, catalog);
            totals.novelty += metrics::novelty(&recommendations, catalog);
            lists.push(recommendations);
        }

        let evaluated = cases.len();
        if evaluated > 0 {
            let n = evaluated as f64;
            totals.precision /= n;
            totals.recall /= n;
            totals.ndcg /= n;
            totals.map /= n;
            totals.diversity /= n;
            totals.novelty /= n;
        }
        totals.coverage = metrics::coverage(&lists, catalog.len());
        totals.users_evaluated = evaluated;

        Ok(totals)
    }
}
