//! Error types for the hydration engine
//!
//! Failures from the store and from subscriber hooks propagate to the
//! caller unchanged; empty-result short-circuits are not errors, and
//! configuration defects are caught when the registry is built.

use thiserror::Error;

/// Result type alias for hydration and save operations
pub type ChainResult<T> = Result<T, ChainError>;

/// Error types for hydration and save operations
#[derive(Debug, Error)]
pub enum ChainError {
    /// Underlying store query or write failed
    #[error("store error: {0}")]
    Store(String),

    /// Registry or relation-chain configuration is invalid
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A subscriber hook failed; the remaining pipeline is aborted
    #[error("subscriber error: {0}")]
    Subscriber(String),

    /// A record is not a JSON object or is missing required key material
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for ChainError {
    fn from(err: anyhow::Error) -> Self {
        ChainError::Store(err.to_string())
    }
}
