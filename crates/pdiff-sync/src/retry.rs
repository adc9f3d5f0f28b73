//! Commit retries.
//!
//! A commit is attempted a bounded number of times with linear backoff.
//! Running out of attempts is not an error for the caller: the diff stays
//! uncommitted, the failure is logged, and the next gossip cycle's catch-up
//! pull is expected to heal the divergence.

use std::time::Duration;

use pdiff_core::{PerspectiveDiff, RevisionFingerprint};
use pdiff_store::Backend;

use crate::error::SyncError;
use crate::gate::GateGuard;
use crate::remote::{call_remote, RemoteOutcome};

/// Attempt budget and backoff for commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait after the n-th failure is `backoff * n`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Result of a commit once the gate was acquired.
#[derive(Debug)]
pub enum CommitOutcome {
    /// The store accepted the diff on the given attempt.
    Committed {
        revision: Option<RevisionFingerprint>,
        attempts: u32,
    },
    /// Every attempt failed; the local revision is unchanged.
    Exhausted { attempts: u32, last_error: SyncError },
}

impl CommitOutcome {
    /// The new revision, if the commit produced one.
    pub fn revision(&self) -> Option<RevisionFingerprint> {
        match self {
            CommitOutcome::Committed { revision, .. } => *revision,
            CommitOutcome::Exhausted { .. } => None,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            CommitOutcome::Committed { attempts, .. } | CommitOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Drives commit attempts against a backend while the gate is held.
pub struct CommitRetrier<'a, B: Backend + ?Sized> {
    backend: &'a B,
    policy: RetryPolicy,
    call_timeout: Option<Duration>,
}

impl<'a, B: Backend + ?Sized> CommitRetrier<'a, B> {
    pub fn new(backend: &'a B, policy: RetryPolicy, call_timeout: Option<Duration>) -> Self {
        Self {
            backend,
            policy,
            call_timeout,
        }
    }

    /// Commit `diff`, updating the gated revision on success.
    pub async fn run(&self, gate: &mut GateGuard<'_>, diff: &PerspectiveDiff) -> CommitOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match call_remote(self.call_timeout, self.backend.commit(diff)).await {
                RemoteOutcome::Ok(revision) => {
                    if let Some(fp) = revision {
                        gate.set_revision(fp);
                    }
                    return CommitOutcome::Committed {
                        revision,
                        attempts: attempt,
                    };
                }
                RemoteOutcome::RemoteFailed(e) => SyncError::Backend(e),
                RemoteOutcome::Timeout(bound) => SyncError::RemoteTimeout(bound),
            };

            if attempt >= max_attempts {
                tracing::error!("commit failed after {} attempts: {}", attempt, error);
                return CommitOutcome::Exhausted {
                    attempts: attempt,
                    last_error: error,
                };
            }

            tracing::warn!("commit attempt {} failed, retrying: {}", attempt, error);
            tokio::time::sleep(self.policy.delay_after(attempt)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::MutationGate;
    use pdiff_testkit::ScriptedBackend;
    use tokio::time::Instant;

    fn fp(byte: u8) -> RevisionFingerprint {
        RevisionFingerprint::from_bytes([byte; 32])
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..5).map(|n| policy.delay_after(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 300, 400]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_fifth_attempt() {
        let backend = ScriptedBackend::new();
        backend.fail_commits(4, "conductor busy");
        backend.push_commit(Ok(Some(fp(5))));

        let gate = MutationGate::new(Some(fp(1)), Duration::from_secs(10));
        let mut guard = gate.acquire().await.unwrap();

        let started = Instant::now();
        let outcome = CommitRetrier::new(&backend, RetryPolicy::default(), None)
            .run(&mut guard, &PerspectiveDiff::default())
            .await;

        assert_eq!(outcome.revision(), Some(fp(5)));
        assert_eq!(outcome.attempts(), 5);
        assert_eq!(guard.revision(), Some(fp(5)));
        assert_eq!(backend.commit_count(), 5);
        // 100 + 200 + 300 + 400 ms of backoff.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1010));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_leaves_revision_unchanged() {
        let backend = ScriptedBackend::new();
        backend.fail_commits(5, "conductor busy");

        let gate = MutationGate::new(Some(fp(1)), Duration::from_secs(10));
        let mut guard = gate.acquire().await.unwrap();

        let outcome = CommitRetrier::new(&backend, RetryPolicy::default(), None)
            .run(&mut guard, &PerspectiveDiff::default())
            .await;

        assert!(!outcome.is_committed());
        assert_eq!(outcome.revision(), None);
        assert!(matches!(outcome, CommitOutcome::Exhausted { attempts: 5, .. }));
        assert_eq!(guard.revision(), Some(fp(1)));
        assert_eq!(backend.commit_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_are_retried() {
        let backend = ScriptedBackend::new();
        backend.set_delay(Duration::from_secs(2));

        let gate = MutationGate::new(None, Duration::from_secs(10));
        let mut guard = gate.acquire().await.unwrap();

        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(10),
        };
        let outcome = CommitRetrier::new(&backend, policy, Some(Duration::from_secs(1)))
            .run(&mut guard, &PerspectiveDiff::default())
            .await;

        match outcome {
            CommitOutcome::Exhausted { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(matches!(last_error, SyncError::RemoteTimeout(_)));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(guard.revision(), None);
    }
}
