use crate::models::{InteractionEvent, ItemId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// Counters for records rejected during ingestion. Bad rows are dropped and
/// reported, never a full-batch abort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub accepted: usize,
    pub dropped: usize,
}

/// Sparse in-memory interaction store: user -> {item -> accumulated weight}.
///
/// Built once per training cycle from the raw event log and held immutable
/// until the next cycle. A weight of zero is equivalent to absence, so
/// zero-weight entries are never stored.
#[derive(Debug, Clone, Default)]
pub struct InteractionStore {
    by_user: HashMap<UserId, HashMap<ItemId, f64>>,
}

impl InteractionStore {
    /// Build a store from raw events. Events with a negative explicit weight
    /// are malformed and dropped; everything else accumulates.
    pub fn from_events(events: &[InteractionEvent]) -> (Self, IngestStats) {
        let mut store = InteractionStore::default();
        let mut stats = IngestStats::default();

        for event in events {
            let weight = match event.weight {
                Some(w) if w < 0.0 => {
                    stats.dropped += 1;
                    continue;
                }
                Some(w) => w,
                None => event.event_type.weight(),
            };

            *store
                .by_user
                .entry(event.user_id)
                .or_default()
                .entry(event.item_id)
                .or_insert(0.0) += weight;
            stats.accepted += 1;
        }

        // Accumulated zero weights carry no signal.
        for items in store.by_user.values_mut() {
            items.retain(|_, w| *w > 0.0);
        }
        store.by_user.retain(|_, items| !items.is_empty());

        info!(
            "Interaction store built: {} users, {} accepted, {} dropped",
            store.by_user.len(),
            stats.accepted,
            stats.dropped
        );

        (store, stats)
    }

    pub fn from_map(by_user: HashMap<UserId, HashMap<ItemId, f64>>) -> Self {
        Self { by_user }
    }

    pub fn user_items(&self, user_id: UserId) -> Option<&HashMap<ItemId, f64>> {
        self.by_user.get(&user_id)
    }

    pub fn users(&self) -> impl Iterator<Item = (&UserId, &HashMap<ItemId, f64>)> {
        self.by_user.iter()
    }

    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    /// All user ids, ascending. Sorted so every downstream matrix build is
    /// deterministic across runs.
    pub fn sorted_user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.by_user.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All item ids appearing in any interaction, ascending.
    pub fn sorted_item_ids(&self) -> Vec<ItemId> {
        let ids: BTreeSet<ItemId> = self
            .by_user
            .values()
            .flat_map(|items| items.keys().copied())
            .collect();
        ids.into_iter().collect()
    }

    /// Number of interactions per item across all users.
    pub fn item_interaction_counts(&self) -> HashMap<ItemId, usize> {
        let mut counts: HashMap<ItemId, usize> = HashMap::new();
        for items in self.by_user.values() {
            for item_id in items.keys() {
                *counts.entry(*item_id).or_insert(0) += 1;
            }
        }
        counts
    }
}
