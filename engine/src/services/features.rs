use crate::models::ItemId;
use crate::services::catalog::ItemCatalog;
use ndarray::{Array1, Array2, Axis};
use std::collections::HashMap;

/// Frozen string -> column-index table for one categorical feature.
///
/// Replaces the hash-mod encoding the legacy pipeline used: every distinct
/// value gets its own slot, so two categories can never collide. The table is
/// built once at training time and never grows at inference time; values
/// unseen during training map to index 0 (the reserved "unknown" slot).
#[derive(Debug, Clone, Default)]
pub struct CategoricalVocabulary {
    index: HashMap<String, usize>,
}

impl CategoricalVocabulary {
    pub fn fit<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let mut distinct: Vec<&str> = values.collect();
        distinct.sort_unstable();
        distinct.dedup();

        // Slot 0 is reserved for unknown values.
        let index = distinct
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v.to_string(), i + 1))
            .collect();

        Self { index }
    }

    pub fn encode(&self, value: &str) -> usize {
        self.index.get(value).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Per-column zero-mean / unit-variance scaler, fitted once at training time
/// and reused verbatim at inference time.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(matrix: &Array2<f64>) -> Self {
        let mean = matrix
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(matrix.ncols()));
        let std = matrix.std_axis(Axis(0), 0.0);
        Self { mean, std }
    }

    pub fn transform(&self, matrix: &Array2<f64>) -> Array2<f64> {
        let mut out = matrix.clone();
        for mut row in out.rows_mut() {
            for (j, value) in row.iter_mut().enumerate() {
                let std = self.std[j];
                // A constant column standardizes to zero, not NaN.
                if std > 0.0 {
                    *value = (*value - self.mean[j]) / std;
                } else {
                    *value = 0.0;
                }
            }
        }
        out
    }

    pub fn transform_row(&self, row: &Array1<f64>) -> Array1<f64> {
        let mut out = row.clone();
        for (j, value) in out.iter_mut().enumerate() {
            let std = self.std[j];
            if std > 0.0 {
                *value = (*value - self.mean[j]) / std;
            } else {
                *value = 0.0;
            }
        }
        out
    }
}

/// Fixed-order item feature encoding: [category slot, brand slot, price,
/// rating], standardized column-wise by the fitted scaler.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    category_vocab: CategoricalVocabulary,
    brand_vocab: CategoricalVocabulary,
    scaler: StandardScaler,
}

pub const FEATURE_DIM: usize = 4;

impl FeatureEncoder {
    /// Fit the vocabularies and scaler over the catalog, returning the
    /// encoder together with the standardized feature matrix in ascending
    /// item-id order.
    pub fn fit(catalog: &ItemCatalog, item_ids: &[ItemId]) -> (Self, Array2<f64>) {
        let category_vocab = CategoricalVocabulary::fit(
            item_ids
                .iter()
                .filter_map(|id| catalog.get(*id))
                .map(|r| r.category.as_str()),
        );
        let brand_vocab = CategoricalVocabulary::fit(
            item_ids
                .iter()
                .filter_map(|id| catalog.get(*id))
                .map(|r| r.brand.as_str()),
        );

        let mut raw = Array2::zeros((item_ids.len(), FEATURE_DIM));
        for (i, item_id) in item_ids.iter().enumerate() {
            // Items without catalog features contribute an all-zero row.
            if let Some(record) = catalog.get(*item_id) {
                raw[[i, 0]] = category_vocab.encode(&record.category) as f64;
                raw[[i, 1]] = brand_vocab.encode(&record.brand) as f64;
                raw[[i, 2]] = record.price;
                raw[[i, 3]] = record.rating;
            }
        }

        let scaler = StandardScaler::fit(&raw);
        let matrix = scaler.transform(&raw);

        (
            Self {
                category_vocab,
                brand_vocab,
                scaler,
            },
            matrix,
        )
    }

    pub fn category_vocab(&self) -> &CategoricalVocabulary {
        &self.category_vocab
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemRecord;
    use crate::services::interactions::InteractionStore;

    fn catalog(records: Vec<ItemRecord>) -> ItemCatalog {
        let (store, _) = InteractionStore::from_events(&[]);
        ItemCatalog::from_records(&records, &store).0
    }

    fn record(item_id: ItemId, category: &str, brand: &str, price: f64) -> ItemRecord {
        ItemRecord {
            item_id,
            category: category.to_string(),
            brand: brand.to_string(),
            price,
            rating: 4.0,
        }
    }

    #[test]
    fn test_vocabulary_assigns_distinct_slots() {
        // The legacy hash-mod encoding could collide two categories into the
        // same slot; the vocabulary cannot.
        let vocab =
            CategoricalVocabulary::fit(["electronics", "furniture", "tools"].into_iter());

        let slots: Vec<usize> = ["electronics", "furniture", "tools"]
            .iter()
            .map(|v| vocab.encode(v))
            .collect();

        assert_eq!(vocab.len(), 3);
        assert!(slots.iter().all(|&s| s > 0));
        let mut unique = slots.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), slots.len());
    }

    #[test]
    fn test_unknown_value_maps_to_reserved_slot() {
        let vocab = CategoricalVocabulary::fit(["tools"].into_iter());
        assert_eq!(vocab.encode("never-seen"), 0);
    }

    #[test]
    fn test_scaler_standardizes_columns() {
        let matrix =
            Array2::from_shape_vec((3, 1), vec![1.0, 2.0, 3.0]).unwrap();
        let scaler = StandardScaler::fit(&matrix);
        let out = scaler.transform(&matrix);

        let col_mean = out.column(0).mean().unwrap();
        assert!(col_mean.abs() < 1e-12);
        assert!(out[[0, 0]] < 0.0 && out[[2, 0]] > 0.0);
    }

    #[test]
    fn test_constant_column_standardizes_to_zero() {
        let matrix = Array2::from_shape_vec((2, 1), vec![5.0, 5.0]).unwrap();
        let scaler = StandardScaler::fit(&matrix);
        let out = scaler.transform(&matrix);

        assert_eq!(out[[0, 0]], 0.0);
        assert_eq!(out[[1, 0]], 0.0);
    }

    #[test]
    fn test_encoder_fit_shape_and_missing_items() {
        let catalog = catalog(vec![
            record(1, "tools", "acme", 10.0),
            record(2, "toys", "bolt", 20.0),
        ]);
        // Item 3 has no catalog features and must encode as an all-zero raw
        // row rather than erroring.
        let (_, matrix) = FeatureEncoder::fit(&catalog, &[1, 2, 3]);

        assert_eq!(matrix.shape(), &[3, FEATURE_DIM]);
    }
}
