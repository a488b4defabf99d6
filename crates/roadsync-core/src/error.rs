//! Error types for roadsync-core

use thiserror::Error;

/// Result type alias using roadsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in roadsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Incident, status code, or ledger entry absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Status code outside the closed enumeration
    #[error("Invalid status '{code}' (valid: {valid})")]
    InvalidStatus {
        /// The rejected status code
        code: String,
        /// Comma-separated list of accepted codes
        valid: String,
    },

    /// More than one counterpart matched the same coordinate key
    #[error("Ambiguous duplicate: {0} records share coordinate key {1}")]
    DuplicateAmbiguity(usize, String),

    /// Sync pass failure
    #[error("Sync error: {0}")]
    Sync(String),

    /// Operation requires the manager role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Document store HTTP error
    #[error("Document store HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Document store API error
    #[error("Document store API error: {0}")]
    DocumentApi(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
