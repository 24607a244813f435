//! Ranking-quality metric suite.
//!
//! Every function here is total: empty recommendation lists, empty relevant
//! sets, and zero denominators all return 0.0, never an error or NaN.

use crate::models::ItemId;
use crate::services::catalog::ItemCatalog;
use std::collections::HashSet;

fn top_k(recommendations: &[(ItemId, f64)], k: usize) -> impl Iterator<Item = ItemId> + '_ {
    recommendations.iter().take(k).map(|(item, _)| *item)
}

/// |top-k ∩ relevant| / k.
pub fn precision_at_k(
    recommendations: &[(ItemId, f64)],
    relevant: &HashSet<ItemId>,
    k: usize,
) -> f64 {
    if recommendations.is_empty() || k == 0 {
        return 0.0;
    }
    let hits = top_k(recommendations, k)
        .filter(|item| relevant.contains(item))
        .count();
    hits as f64 / k as f64
}

/// |top-k ∩ relevant| / |relevant|.
pub fn recall_at_k(
    recommendations: &[(ItemId, f64)],
    relevant: &HashSet<ItemId>,
    k: usize,
) -> f64 {
    if relevant.is_empty() || recommendations.is_empty() || k == 0 {
        return 0.0;
    }
    let hits = top_k(recommendations, k)
        .filter(|item| relevant.contains(item))
        .count();
    hits as f64 / relevant.len() as f64
}

/// Normalized discounted cumulative gain with binary relevance. The gain at
/// 0-based rank r is 1/log2(r + 2); IDCG places all (available) relevant
/// items first.
pub fn ndcg_at_k(
    recommendations: &[(ItemId, f64)],
    relevant: &HashSet<ItemId>,
    k: usize,
) -> f64 {
    if recommendations.is_empty() || relevant.is_empty() || k == 0 {
        return 0.0;
    }

    let dcg: f64 = top_k(recommendations, k)
        .enumerate()
        .filter(|(_, item)| relevant.contains(item))
        .map(|(rank, _)| 1.0 / ((rank as f64 + 2.0).log2()))
        .sum();

    let idcg: f64 = (0..relevant.len().min(k))
        .map(|rank| 1.0 / ((rank as f64 + 2.0).log2()))
        .sum();

    if idcg > 0.0 {
        dcg / idcg
    } else {
        0.0
    }
}

/// Mean average precision: the precision at each relevant hit's rank,
/// summed and divided by |relevant|.
pub fn map_at_k(
    recommendations: &[(ItemId, f64)],
    relevant: &HashSet<ItemId>,
    k: usize,
) -> f64 {
    if relevant.is_empty() || recommendations.is_empty() || k == 0 {
        return 0.0;
    }

    let mut hits = 0usize;
    let mut precision_sum = 0.0;
    for (rank, item) in top_k(recommendations, k).enumerate() {
        if relevant.contains(&item) {
            hits += 1;
            precision_sum += hits as f64 / (rank + 1) as f64;
        }
    }
    precision_sum / relevant.len() as f64
}

/// Fraction of the catalog that ever appears across a sample of
/// recommendation lists.
pub fn coverage(lists: &[Vec<(ItemId, f64)>], catalog_size: usize) -> f64 {
    if catalog_size == 0 {
        return 0.0;
    }
    let distinct: HashSet<ItemId> = lists
        .iter()
        .flat_map(|list| list.iter().map(|(item, _)| *item))
        .collect();
    distinct.len() as f64 / catalog_size as f64
}

/// Fraction of distinct categories among one user's recommended items;
/// 1.0 means every item came from a different category. Items without
/// catalog features share a single "unknown" bucket.
pub fn diversity(recommendations: &[(ItemId, f64)], catalog: &ItemCatalog) -> f64 {
    if recommendations.is_empty() {
        return 0.0;
    }
    let categories: HashSet<&str> = recommendations
        .iter()
        .map(|(item, _)| catalog.category_of(*item).unwrap_or(""))
        .collect();
    categories.len() as f64 / recommendations.len() as f64
}

/// 1 − (mean popularity of recommended items / max catalog popularity).
/// Items never interacted with have popularity 0, so a list of unseen items
/// scores 1.0.
pub fn novelty(recommendations: &[(ItemId, f64)], catalog: &ItemCatalog) -> f64 {
    if recommendations.is_empty() {
        return 0.0;
    }
    let max_popularity = catalog.max_popularity();
    if max_popularity == 0 {
        return 0.0;
    }
    let mean_popularity: f64 = recommendations
        .iter()
        .map(|(item, _)| catalog.popularity_of(*item) as f64)
        .sum::<f64>()
        / recommendations.len() as f64;
    1.0 - mean_popularity / max_popularity as f64
}
