//! Error types for the store module.

use pdiff_core::{AgentId, CoreError, RevisionFingerprint};
use thiserror::Error;

/// Errors returned by backing-store calls.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The remote side rejected or failed the call.
    #[error("remote call failed: {0}")]
    Remote(String),

    /// A pull named a revision the store has never seen.
    #[error("unknown revision: {0}")]
    UnknownRevision(RevisionFingerprint),

    /// The calling agent is not part of the network.
    #[error("unknown agent: {0}")]
    UnknownAgent(AgentId),

    /// The store cannot be reached right now.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Opaque failure from the conductor hosting the store.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, BackendError>;
