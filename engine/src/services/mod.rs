pub mod blender;
pub mod cache;
pub mod catalog;
pub mod drift;
pub mod engine;
pub mod evaluation;
pub mod features;
pub mod interactions;
pub mod metrics;
pub mod scorers;

pub use blender::HybridBlender;
pub use cache::PredictionCache;
pub use catalog::ItemCatalog;
pub use drift::{DriftDetector, DriftReport};
pub use engine::{HybridEngine, HYBRID_MODEL};
pub use evaluation::EvaluationHarness;
pub use interactions::InteractionStore;
pub use scorers::{
    CollaborativeScorer, ContentScorer, MatrixFactorizationScorer, Scorer, TrainingData,
};
