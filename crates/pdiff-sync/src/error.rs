//! Error types for the sync engine.

use std::time::Duration;

use pdiff_store::BackendError;
use thiserror::Error;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The mutation gate could not be acquired within its bound.
    #[error("mutation gate timeout after {0:?}")]
    LockTimeout(Duration),

    /// A backing-store call failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A backing-store call did not answer within the call timeout.
    #[error("remote call timed out after {0:?}")]
    RemoteTimeout(Duration),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
