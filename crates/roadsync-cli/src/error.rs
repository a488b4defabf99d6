//! CLI error type

use thiserror::Error;

/// Errors surfaced to the terminal user
#[derive(Error, Debug)]
pub enum CliError {
    /// Core library error
    #[error("{0}")]
    Core(#[from] roadsync_core::Error),

    /// Serialization error for --json output
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
