use crate::models::{ItemId, ScoredItem, UserId};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache key: user, a hash of the sorted history, and the requested depth.
/// Sorting makes `[1, 2]` and `[2, 1]` the same request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    user_id: UserId,
    history_hash: u64,
    k: usize,
}

impl CacheKey {
    fn new(user_id: UserId, history: &[ItemId], k: usize) -> Self {
        let mut sorted = history.to_vec();
        sorted.sort_unstable();
        let mut hasher = DefaultHasher::new();
        sorted.hash(&mut hasher);
        Self {
            user_id,
            history_hash: hasher.finish(),
            k,
        }
    }
}

struct CachedEntry {
    recommendations: Vec<ScoredItem>,
    stored_at: Instant,
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub ttl_secs: u64,
}

/// TTL-bounded prediction cache in front of the engine.
///
/// DashMap's entry API gives the single-writer-per-key guarantee: concurrent
/// identical requests race to one `entry` lock and the losers read the
/// winner's value; readers of other keys never block.
pub struct PredictionCache {
    entries: DashMap<CacheKey, CachedEntry>,
    ttl: Duration,
}

impl PredictionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, user_id: UserId, history: &[ItemId], k: usize) -> Option<Vec<ScoredItem>> {
        let key = CacheKey::new(user_id, history, k);
        let entry = self.entries.get(&key)?;
        if entry.stored_at.elapsed() >= self.ttl {
            return None;
        }
        debug!("Prediction cache hit for user {}", user_id);
        Some(entry.recommendations.clone())
    }

    /// Fetch from cache or compute and populate. Expired entries are
    /// replaced in place under the entry lock.
    pub fn get_or_insert_with<F>(
        &self,
        user_id: UserId,
        history: &[ItemId],
        k: usize,
        compute: F,
    ) -> Vec<ScoredItem>
    where
        F: FnOnce() -> Vec<ScoredItem>,
    {
        use dashmap::mapref::entry::Entry;

        let key = CacheKey::new(user_id, history, k);
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().stored_at.elapsed() >= self.ttl {
                    // Stale: the holder of the entry lock recomputes once.
                    let recommendations = compute();
                    occupied.insert(CachedEntry {
                        recommendations: recommendations.clone(),
                        stored_at: Instant::now(),
                    });
                    recommendations
                } else {
                    debug!("Prediction cache hit for user {}", user_id);
                    occupied.get().recommendations.clone()
                }
            }
            Entry::Vacant(vacant) => {
                let recommendations = compute();
                vacant.insert(CachedEntry {
                    recommendations: recommendations.clone(),
                    stored_at: Instant::now(),
                });
                recommendations
            }
        }
    }

    pub fn insert(&self, user_id: UserId, history: &[ItemId], k: usize, recs: Vec<ScoredItem>) {
        self.entries.insert(
            CacheKey::new(user_id, history, k),
            CachedEntry {
                recommendations: recs,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
