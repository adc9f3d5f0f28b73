//! Error types for the adapter.

use pdiff_store::BackendError;
use pdiff_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during adapter operations.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Sync engine error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Backing store error from a call made outside the engine.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
