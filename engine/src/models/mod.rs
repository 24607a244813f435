use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type ItemId = u64;

/// Implicit feedback event type. Weights follow the marketplace event log
/// convention: a purchase is a much stronger signal than a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    View,
    AddToCart,
    Purchase,
}

impl EventType {
    pub fn weight(&self) -> f64 {
        match self {
            EventType::View => 1.0,
            EventType::AddToCart => 3.0,
            EventType::Purchase => 5.0,
        }
    }
}

/// One raw event from the interaction log. Repeated events for the same
/// (user, item) pair accumulate into a single interaction weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub event_type: EventType,
    /// Explicit weight override; when present it replaces the event-type
    /// weight for this event. Negative values are rejected at ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// Raw catalog attributes for one item, before feature encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub item_id: ItemId,
    pub category: String,
    pub brand: String,
    pub price: f64,
    pub rating: f64,
}

/// One entry of a recommendation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: ItemId,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Outcome of one training run. Partial success is a normal outcome: the
/// scorers that failed are listed with their failure reasons instead of
/// aborting the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub trained: Vec<String>,
    pub failed: Vec<ScorerFailure>,
    pub dropped_records: usize,
    pub user_count: usize,
    pub item_count: usize,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerFailure {
    pub scorer: String,
    pub reason: String,
}

/// Ranking-quality metrics at a fixed cutoff k. All values live in [0, 1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingMetrics {
    pub precision: f64,
    pub recall: f64,
    pub ndcg: f64,
    pub map: f64,
    pub coverage: f64,
    pub diversity: f64,
    pub novelty: f64,
    pub users_evaluated: usize,
}
