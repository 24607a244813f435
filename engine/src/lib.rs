pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
pub use services::{
    DriftDetector, EvaluationHarness, HybridBlender, HybridEngine, InteractionStore, ItemCatalog,
    PredictionCache, Scorer, TrainingData,
};
