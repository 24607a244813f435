use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{
    InteractionEvent, ItemId, ItemRecord, RankingMetrics, ScoredItem, UserId,
};
use crate::services::cache::CacheStats;
use crate::services::catalog::ItemCatalog;
use crate::services::drift::{DriftDetector, DriftReport};
use crate::services::engine::{HybridEngine, HYBRID_MODEL};
use crate::services::interactions::InteractionStore;
use crate::services::scorers::TrainingData;
use crate::services::PredictionCache;
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared serving state. The engine lives behind an `Arc` that retraining
/// replaces wholesale: readers clone the `Arc` and keep scoring against the
/// old parameters while a swap happens. The drift detector follows the same
/// single-writer discipline.
pub struct AppState {
    pub engine: RwLock<Arc<HybridEngine>>,
    pub drift: RwLock<Option<DriftDetector>>,
    pub cache: PredictionCache,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let engine = HybridEngine::new(&config.engine);
        Self {
            engine: RwLock::new(Arc::new(engine)),
            drift: RwLock::new(None),
            cache: PredictionCache::new(Duration::from_secs(config.engine.cache_ttl_secs)),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub history: Vec<ItemId>,
    pub n_recommendations: Option<i64>,
    pub model_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub user_id: UserId,
    pub recommendations: Vec<ScoredItem>,
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchPredictRequest {
    pub requests: Vec<PredictRequest>,
}

#[derive(Debug, Serialize)]
pub struct BatchPredictResponse {
    pub results: Vec<PredictResponse>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    pub events: Vec<InteractionEvent>,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
    pub dataset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRequest {
    pub events: Vec<InteractionEvent>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub models: Vec<String>,
    pub cache_stats: CacheStats,
}

fn clamp_k(requested: Option<i64>, default_k: usize) -> usize {
    match requested {
        Some(n) => n.max(0) as usize,
        None => default_k,
    }
}

async fn predict_one(state: &AppState, request: &PredictRequest) -> Result<PredictResponse> {
    let k = clamp_k(request.n_recommendations, state.config.engine.default_k);
    let engine = state.engine.read().await.clone();

    let model = request.model_name.as_deref().unwrap_or(HYBRID_MODEL);
    let recommendations = if model == HYBRID_MODEL {
        if !engine.is_trained() {
            return Err(AppError::NotTrained("no scorer has been trained".to_string()));
        }
        // Hybrid predictions cannot fail once the engine is trained, so the
        // cache closure may safely degrade any residual error to empty.
        state
            .cache
            .get_or_insert_with(request.user_id, &request.history, k, || {
                engine
                    .predict(request.user_id, &request.history, k, None)
                    .unwrap_or_default()
            })
    } else {
        engine.predict(request.user_id, &request.history, k, Some(model))?
    };

    Ok(PredictResponse {
        user_id: request.user_id,
        recommendations,
        model: model.to_string(),
    })
}

#[post("/predict")]
pub async fn predict(
    state: web::Data<AppState>,
    request: web::Json<PredictRequest>,
) -> Result<HttpResponse> {
    let request_id = Uuid::new_v4();
    debug!(
        %request_id,
        user_id = request.user_id,
        history_len = request.history.len(),
        "Prediction request"
    );

    let response = predict_one(&state, &request).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/batch_predict")]
pub async fn batch_predict(
    state: web::Data<AppState>,
    request: web::Json<BatchPredictRequest>,
) -> Result<HttpResponse> {
    let mut results = Vec::with_capacity(request.requests.len());
    for one in &request.requests {
        // One bad request degrades to an empty list rather than failing the
        // whole batch.
        match predict_one(&state, one).await {
            Ok(response) => results.push(response),
            Err(err) => {
                warn!("Batch prediction entry failed: {}", err);
                results.push(PredictResponse {
                    user_id: one.user_id,
                    recommendations: Vec::new(),
                    model: one
                        .model_name
                        .clone()
                        .unwrap_or_else(|| HYBRID_MODEL.to_string()),
                });
            }
        }
    }

    let count = results.len();
    Ok(HttpResponse::Ok().json(BatchPredictResponse { results, count }))
}

#[post("/train")]
pub async fn train(
    state: web::Data<AppState>,
    request: web::Json<TrainRequest>,
) -> Result<HttpResponse> {
    let TrainRequest {
        events,
        items,
        dataset,
    } = request.into_inner();
    info!(
        dataset = dataset.as_deref().unwrap_or("default"),
        events = events.len(),
        items = items.len(),
        "Training triggered"
    );

    let engine_config = state.config.engine.clone();

    // Training is a synchronous batch job; keep it off the async workers.
    let (engine, report) = web::block(move || {
        let (interactions, stats) = InteractionStore::from_events(&events);
        let (catalog, dropped_items) = ItemCatalog::from_records(&items, &interactions);
        let mut engine = HybridEngine::new(&engine_config);
        let report = engine.train(
            TrainingData {
                interactions,
                catalog,
            },
            stats.dropped + dropped_items,
        );
        (engine, report)
    })
    .await
    .map_err(|e| AppError::Internal(format!("training job panicked: {e}")))?;

    // Atomic swap: in-flight predictions keep the old Arc.
    *state.engine.write().await = Arc::new(engine);
    state.cache.clear();

    Ok(HttpResponse::Ok().json(report))
}

#[post("/evaluate")]
pub async fn evaluate(
    state: web::Data<AppState>,
    request: web::Json<SnapshotRequest>,
) -> Result<HttpResponse> {
    let (test_store, _) = InteractionStore::from_events(&request.events);
    let engine = state.engine.read().await.clone();

    let results: HashMap<String, RankingMetrics> = engine.evaluate(&test_store)?;
    Ok(HttpResponse::Ok().json(results))
}

#[post("/drift/reset")]
pub async fn drift_reset(
    state: web::Data<AppState>,
    request: web::Json<SnapshotRequest>,
) -> Result<HttpResponse> {
    let (snapshot, _) = InteractionStore::from_events(&request.events);

    let mut guard = state.drift.write().await;
    match guard.as_mut() {
        Some(detector) => detector.reset(&snapshot),
        None => *guard = Some(DriftDetector::new(&snapshot)),
    }
    info!("Drift baseline reset: {} users", snapshot.user_count());

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "baseline set" })))
}

#[post("/drift/check")]
pub async fn drift_check(
    state: web::Data<AppState>,
    request: web::Json<SnapshotRequest>,
) -> Result<HttpResponse> {
    let (snapshot, _) = InteractionStore::from_events(&request.events);

    let guard = state.drift.read().await;
    let detector = guard
        .as_ref()
        .ok_or_else(|| AppError::NotFound("no drift baseline set".to_string()))?;

    let report: DriftReport = detector.detect(&snapshot);
    Ok(HttpResponse::Ok().json(report))
}

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> Result<HttpResponse> {
    let engine = state.engine.read().await.clone();
    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        models: engine.trained_scorer_names(),
        cache_stats: state.cache.stats(),
    }))
}

#[post("/cache/clear")]
pub async fn clear_cache(state: web::Data<AppState>) -> Result<HttpResponse> {
    state.cache.clear();
    info!("Prediction cache cleared");
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "cache cleared" })))
}
