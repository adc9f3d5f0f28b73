//! Typed outcomes for backing-store calls.
//!
//! Every call the engine makes into the store goes through [`call_remote`],
//! so callers can tell a failed call from one that never answered.

use std::future::Future;
use std::time::Duration;

use pdiff_store::BackendError;

use crate::error::SyncError;

/// How a single remote call ended.
#[derive(Debug)]
pub enum RemoteOutcome<T> {
    Ok(T),
    RemoteFailed(BackendError),
    Timeout(Duration),
}

impl<T> RemoteOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, RemoteOutcome::Ok(_))
    }

    pub fn into_result(self) -> Result<T, SyncError> {
        match self {
            RemoteOutcome::Ok(value) => Ok(value),
            RemoteOutcome::RemoteFailed(e) => Err(SyncError::Backend(e)),
            RemoteOutcome::Timeout(bound) => Err(SyncError::RemoteTimeout(bound)),
        }
    }
}

/// Run a store call, bounded by `timeout` when one is configured.
pub async fn call_remote<T, F>(timeout: Option<Duration>, call: F) -> RemoteOutcome<T>
where
    F: Future<Output = pdiff_store::Result<T>>,
{
    let result = match timeout {
        Some(bound) => match tokio::time::timeout(bound, call).await {
            Ok(result) => result,
            Err(_) => return RemoteOutcome::Timeout(bound),
        },
        None => call.await,
    };

    match result {
        Ok(value) => RemoteOutcome::Ok(value),
        Err(e) => RemoteOutcome::RemoteFailed(e),
    }
}
