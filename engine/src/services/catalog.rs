use crate::models::{ItemId, ItemRecord};
use crate::services::interactions::InteractionStore;
use std::collections::HashMap;
use tracing::info;

/// Catalog of item attributes plus per-item popularity counters derived from
/// the interaction log. Built once per training cycle.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: HashMap<ItemId, ItemRecord>,
    popularity: HashMap<ItemId, usize>,
}

impl ItemCatalog {
    /// Build a catalog from raw item records. Records with a non-finite
    /// price or rating are malformed and dropped; the caller gets the count.
    pub fn from_records(records: &[ItemRecord], store: &InteractionStore) -> (Self, usize) {
        let mut items = HashMap::new();
        let mut dropped = 0usize;

        for record in records {
            if !record.price.is_finite() || !record.rating.is_finite() {
                dropped += 1;
                continue;
            }
            items.insert(record.item_id, record.clone());
        }

        let popularity = store.item_interaction_counts();

        info!(
            "Item catalog built: {} items, {} dropped",
            items.len(),
            dropped
        );

        (Self { items, popularity }, dropped)
    }

    pub fn get(&self, item_id: ItemId) -> Option<&ItemRecord> {
        self.items.get(&item_id)
    }

    pub fn category_of(&self, item_id: ItemId) -> Option<&str> {
        self.items.get(&item_id).map(|r| r.category.as_str())
    }

    /// Interaction-count popularity; items never interacted with have
    /// popularity 0.
    pub fn popularity_of(&self, item_id: ItemId) -> usize {
        self.popularity.get(&item_id).copied().unwrap_or(0)
    }

    pub fn max_popularity(&self) -> usize {
        self.popularity.values().copied().max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All catalog item ids, ascending, for deterministic matrix builds.
    pub fn sorted_item_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.items.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, InteractionEvent};

    fn record(item_id: ItemId, category: &str) -> ItemRecord {
        ItemRecord {
            item_id,
            category: category.to_string(),
            brand: "acme".to_string(),
            price: 10.0,
            rating: 4.0,
        }
    }

    #[test]
    fn test_malformed_record_dropped() {
        let mut bad = record(2, "tools");
        bad.price = f64::NAN;
        let records = vec![record(1, "tools"), bad];
        let (store, _) = InteractionStore::from_events(&[]);

        let (catalog, dropped) = ItemCatalog::from_records(&records, &store);

        assert_eq!(dropped, 1);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get(2).is_none());
    }

    #[test]
    fn test_popularity_from_interactions() {
        let events = vec![
            InteractionEvent {
                user_id: 1,
                item_id: 101,
                event_type: EventType::View,
                weight: None,
            },
            InteractionEvent {
                user_id: 2,
                item_id: 101,
                event_type: EventType::Purchase,
                weight: None,
            },
        ];
        let (store, _) = InteractionStore::from_events(&events);
        let (catalog, _) = ItemCatalog::from_records(&[record(101, "tools")], &store);

        assert_eq!(catalog.popularity_of(101), 2);
        assert_eq!(catalog.popularity_of(999), 0);
        assert_eq!(catalog.max_popularity(), 2);
    }
}
