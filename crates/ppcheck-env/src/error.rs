//! Error types for ppcheck-env

use thiserror::Error;

/// Errors that can occur while preparing or using a toolchain environment
#[derive(Error, Debug)]
pub enum EnvError {
    /// Version identifier contains characters that are unsafe to embed in tags or commands
    #[error("Invalid toolchain version: {0:?}")]
    InvalidVersion(String),

    /// Environment definition (Dockerfile) not found
    #[error("Environment definition not found at path: {0}")]
    DefinitionNotFound(String),

    /// Container runtime binary could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Container runtime command exited unsuccessfully
    #[error("{0}")]
    CommandFailed(String),

    /// Container runtime command exceeded its wall-clock bound
    #[error("{program} timed out after {secs} seconds")]
    TimedOut { program: String, secs: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EnvError {
    /// Whether this error was caused by a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EnvError::TimedOut { .. })
    }
}
