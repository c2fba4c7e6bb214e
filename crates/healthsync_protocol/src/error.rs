//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while encoding, decoding or validating protocol values.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The same record identifier appears twice in one batch.
    #[error("duplicate record id in batch: {0}")]
    DuplicateRecordId(String),

    /// A record violates a structural rule.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
