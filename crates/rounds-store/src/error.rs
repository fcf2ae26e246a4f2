//! Error types for the signature store.

use thiserror::Error;

/// Errors that can occur in the signature persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database query failed: {0}")]
    Query(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("signature not found: {0}")]
    SignatureNotFound(String),

    #[error("schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<StoreError> for rounds_core::DiagnosticError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SignatureNotFound(id) => rounds_core::DiagnosticError::NotFound(id),
            other => rounds_core::DiagnosticError::Transport(other.to_string()),
        }
    }
}

/// Result type for signature store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
