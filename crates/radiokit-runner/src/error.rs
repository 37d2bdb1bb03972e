//! Error type for the runner.

use radiokit_dem::DemError;
use radiokit_itm::ItmError;
use radiokit_link::LinkError;
use thiserror::Error;

/// Errors surfaced by runner commands.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No OpenTopography API key: pass --api-key or set {0}")]
    MissingApiKey(&'static str),

    #[error(transparent)]
    Dem(#[from] DemError),

    #[error(transparent)]
    Itm(#[from] ItmError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
