//! Error types for pdiff core.

use thiserror::Error;

/// Errors raised while decoding core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid revision fingerprint: {0}")]
    InvalidFingerprint(String),

    /// An inbound signal matched neither the heartbeat nor the echo shape.
    #[error("malformed signal: {0}")]
    MalformedSignal(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
