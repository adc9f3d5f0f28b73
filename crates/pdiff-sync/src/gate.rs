//! The mutation gate.
//!
//! `sync`, `commit` and the gossip cycle all read the local revision, call
//! the backing store, and may write the local revision back. The gate makes
//! each of those read-decide-write sequences a single non-interleavable unit.
//!
//! Invariant: the local revision held inside the gate is only meaningful
//! between acquire and release. Readers outside the gate get the last
//! published value through [`MutationGate::snapshot`] or a watch receiver,
//! which never blocks writers.

use std::time::Duration;

use pdiff_core::RevisionFingerprint;
use tokio::sync::{watch, Mutex, MutexGuard};

use crate::error::{Result, SyncError};

/// Mutual exclusion over the local revision, with a bounded wait.
pub struct MutationGate {
    revision: Mutex<Option<RevisionFingerprint>>,
    published: watch::Sender<Option<RevisionFingerprint>>,
    timeout: Duration,
}

impl MutationGate {
    pub fn new(initial: Option<RevisionFingerprint>, timeout: Duration) -> Self {
        let (published, _) = watch::channel(initial);
        Self {
            revision: Mutex::new(initial),
            published,
            timeout,
        }
    }

    /// Acquire the gate, failing with `LockTimeout` instead of waiting forever.
    pub async fn acquire(&self) -> Result<GateGuard<'_>> {
        match tokio::time::timeout(self.timeout, self.revision.lock()).await {
            Ok(guard) => Ok(GateGuard {
                guard,
                published: &self.published,
            }),
            Err(_) => Err(SyncError::LockTimeout(self.timeout)),
        }
    }

    /// The last revision written through the gate.
    pub fn snapshot(&self) -> Option<RevisionFingerprint> {
        *self.published.borrow()
    }

    /// Subscribe to revision changes.
    pub fn watch(&self) -> watch::Receiver<Option<RevisionFingerprint>> {
        self.published.subscribe()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Exclusive access to the local revision. Dropping it releases the gate.
pub struct GateGuard<'a> {
    guard: MutexGuard<'a, Option<RevisionFingerprint>>,
    published: &'a watch::Sender<Option<RevisionFingerprint>>,
}

impl GateGuard<'_> {
    pub fn revision(&self) -> Option<RevisionFingerprint> {
        *self.guard
    }

    /// Overwrite the local revision and publish it to snapshot readers.
    pub fn set_revision(&mut self, revision: RevisionFingerprint) {
        *self.guard = Some(revision);
        self.published.send_replace(Some(revision));
    }
}
