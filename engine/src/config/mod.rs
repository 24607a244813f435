use serde::Deserialize;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub http_port: u16,
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Default recommendation depth when a request does not specify one.
    pub default_k: usize,
    /// Cutoff used by the offline evaluation harness.
    pub evaluation_k: usize,
    pub cache_ttl_secs: u64,

    // Collaborative scorer
    pub min_similarity: f64,
    pub max_neighbors: usize,

    // Content scorer
    pub similarity_threshold: f64,

    // Matrix factorization scorer
    pub mf_factors: usize,
    pub mf_learning_rate: f64,
    pub mf_epochs: usize,
    /// Seed for factor init and negative sampling; fixed so training runs
    /// are reproducible.
    pub mf_seed: u64,

    /// Blend weights by scorer name. Weights are a weighted sum, not an
    /// average; unnamed scorers fall back to a small positive constant.
    pub model_weights: HashMap<String, f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_k: 10,
            evaluation_k: 10,
            cache_ttl_secs: 3600,
            min_similarity: 0.1,
            max_neighbors: 50,
            similarity_threshold: 0.7,
            mf_factors: 16,
            mf_learning_rate: 0.05,
            mf_epochs: 30,
            mf_seed: 42,
            model_weights: [
                ("collaborative".to_string(), 0.4),
                ("content_based".to_string(), 0.3),
                ("matrix_factorization".to_string(), 0.3),
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = EngineConfig::default();

        Config {
            service: ServiceConfig {
                http_port: env_or("HTTP_PORT", 8012),
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "recommendation-engine".to_string()),
            },
            engine: EngineConfig {
                default_k: env_or("DEFAULT_K", defaults.default_k),
                evaluation_k: env_or("EVALUATION_K", defaults.evaluation_k),
                cache_ttl_secs: env_or("CACHE_TTL_SECS", defaults.cache_ttl_secs),
                min_similarity: env_or("CF_MIN_SIMILARITY", defaults.min_similarity),
                max_neighbors: env_or("CF_MAX_NEIGHBORS", defaults.max_neighbors),
                similarity_threshold: env_or("CB_SIMILARITY_THRESHOLD", defaults.similarity_threshold),
                mf_factors: env_or("MF_FACTORS", defaults.mf_factors),
                mf_learning_rate: env_or("MF_LEARNING_RATE", defaults.mf_learning_rate),
                mf_epochs: env_or("MF_EPOCHS", defaults.mf_epochs),
                mf_seed: env_or("MF_SEED", defaults.mf_seed),
                model_weights: [
                    (
                        "collaborative".to_string(),
                        env_or("WEIGHT_COLLABORATIVE", 0.4),
                    ),
                    (
                        "content_based".to_string(),
                        env_or("WEIGHT_CONTENT_BASED", 0.3),
                    ),
                    (
                        "matrix_factorization".to_string(),
                        env_or("WEIGHT_MATRIX_FACTORIZATION", 0.3),
                    ),
                ]
                .into_iter()
                .collect(),
            },
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EngineConfig::default();

        assert_eq!(config.min_similarity, 0.1);
        assert_eq!(config.max_neighbors, 50);
        assert_eq!(config.similarity_threshold, 0.7);
        assert_eq!(config.mf_seed, 42);
        assert_eq!(config.cache_ttl_secs, 3600);
    }
}
