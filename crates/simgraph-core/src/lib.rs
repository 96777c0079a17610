//! Shared configuration and graph domain types for simgraph.

pub mod app_config;
pub mod config;
pub mod graph;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use graph::{
    NodeUpsert, Post, PostNode, PriorEdge, ReconciliationPlan, SentimentLabel, SimilarityEdge,
    UserNode, UserPair,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
