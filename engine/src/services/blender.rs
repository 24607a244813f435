use crate::models::ItemId;
use crate::services::scorers::rank_and_truncate;
use std::collections::HashMap;

/// Weight applied to a scorer nobody configured. Small and positive: an
/// unconfigured scorer still contributes, it just cannot dominate.
pub const FALLBACK_WEIGHT: f64 = 0.1;

/// Weighted score fusion over per-scorer ranked lists.
///
/// Blending is a weighted **sum**, not a weighted average: weights need not
/// sum to 1 and the engine does not renormalize. The combination is a pure
/// function of the inputs, independent of the order scorers are listed in.
#[derive(Debug, Clone, Default)]
pub struct HybridBlender {
    weights: HashMap<String, f64>,
}

impl HybridBlender {
    pub fn new(weights: HashMap<String, f64>) -> Self {
        Self { weights }
    }

    pub fn weight_for(&self, scorer: &str) -> f64 {
        self.weights.get(scorer).copied().unwrap_or(FALLBACK_WEIGHT)
    }

    /// Combine per-scorer outputs into one ranked list of at most `k` items.
    /// Scorers that failed upstream simply do not appear in `outputs`.
    pub fn combine(
        &self,
        outputs: &HashMap<String, Vec<(ItemId, f64)>>,
        k: usize,
    ) -> Vec<(ItemId, f64)> {
        let mut accumulated: HashMap<ItemId, f64> = HashMap::new();

        // Iterate scorer names in sorted order so floating-point accumulation
        // is identical across runs.
        let mut names: Vec<&String> = outputs.keys().collect();
        names.sort();

        for name in names {
            let weight = self.weight_for(name);
            for (item_id, score) in &outputs[name] {
                *accumulated.entry(*item_id).or_insert(0.0) += score * weight;
            }
        }

        rank_and_truncate(accumulated.into_iter().collect(), k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(entries: Vec<(&str, Vec<(ItemId, f64)>)>) -> HashMap<String, Vec<(ItemId, f64)>> {
        entries
            .into_iter()
            .map(|(name, list)| (name.to_string(), list))
            .collect()
    }

    #[test]
    fn test_weighted_sum_and_ordering() {
        let blender = HybridBlender::new(
            [("a".to_string(), 0.5), ("b".to_string(), 0.25)]
                .into_iter()
                .collect(),
        );

        let combined = blender.combine(
            &outputs(vec![
                ("a", vec![(1, 1.0), (2, 0.5)]),
                ("b", vec![(2, 1.0), (3, 1.0)]),
            ]),
            10,
        );

        // item1: 0.5, item2: 0.25 + 0.25 = 0.5, item3: 0.25
        // Tie between items 1 and 2 resolves by ascending item id.
        assert_eq!(combined, vec![(1, 0.5), (2, 0.5), (3, 0.25)]);
    }

    #[test]
    fn test_unconfigured_scorer_gets_fallback_weight() {
        let blender = HybridBlender::default();
        let combined = blender.combine(&outputs(vec![("mystery", vec![(7, 1.0)])]), 10);

        assert_eq!(combined, vec![(7, FALLBACK_WEIGHT)]);
    }

    #[test]
    fn test_combination_is_order_independent() {
        let weights: HashMap<String, f64> = [
            ("a".to_string(), 0.3),
            ("b".to_string(), 0.2),
            ("c".to_string(), 0.1),
        ]
        .into_iter()
        .collect();
        let blender = HybridBlender::new(weights);

        let a = vec![(1, 0.9), (2, 0.4)];
        let b = vec![(2, 0.8), (3, 0.6)];
        let c = vec![(1, 0.2), (3, 0.7)];

        // Combining {a,b} then adding c's contribution must match combining
        // all three at once, given fixed per-scorer outputs.
        let all_at_once = blender.combine(
            &outputs(vec![("a", a.clone()), ("b", b.clone()), ("c", c.clone())]),
            10,
        );

        let partial = blender.combine(&outputs(vec![("a", a), ("b", b)]), usize::MAX);
        let mut accumulated: HashMap<ItemId, f64> = partial.into_iter().collect();
        for (item, score) in &c {
            *accumulated.entry(*item).or_insert(0.0) += score * blender.weight_for("c");
        }
        let mut incremental: Vec<(ItemId, f64)> = accumulated.into_iter().collect();
        incremental.sort_by(|x, y| {
            y.1.partial_cmp(&x.1)
                .unwrap()
                .then_with(|| x.0.cmp(&y.0))
        });

        for ((item_a, score_a), (item_b, score_b)) in all_at_once.iter().zip(incremental.iter()) {
            assert_eq!(item_a, item_b);
            assert!((score_a - score_b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_truncates_to_k() {
        let blender = HybridBlender::default();
        let combined = blender.combine(
            &outputs(vec![("a", vec![(1, 0.9), (2, 0.8), (3, 0.7)])]),
            2,
        );
        assert_eq!(combined.len(), 2);
    }

    #[test]
    fn test_empty_outputs_blend_to_empty() {
        let blender = HybridBlender::default();
        assert!(blender.combine(&HashMap::new(), 5).is_empty());
    }
}
