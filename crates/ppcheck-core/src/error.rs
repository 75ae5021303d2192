//! Error types for ppcheck-core

use ppcheck_env::EnvError;
use thiserror::Error;

/// Errors raised by the harness outside of per-cell outcomes
#[derive(Error, Debug)]
pub enum HarnessError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment layer error
    #[error(transparent)]
    Env(#[from] EnvError),

    /// Test directory walk failed
    #[error("Failed to scan test directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// Test case lacks its debugger script (strict discovery only)
    #[error("Test case {name} is missing {script}")]
    MissingScript { name: String, script: String },

    /// Value is not safe to embed in the in-container shell pipeline
    #[error("Refusing to embed unsafe value {0:?} in a container command")]
    UnsafeValue(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}
