use hubserve_core::config::ConfigError;
use hubserve_core::{ArtifactError, EngineError};

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model resolution failed: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Engine load failed: {0}")]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
