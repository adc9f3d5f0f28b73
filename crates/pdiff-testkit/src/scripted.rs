//! A backend whose answers are scripted by the test.
//!
//! Queued responses are consumed in order; once a queue is empty the
//! backend falls back to well-behaved defaults:
//!
//! - `commit` succeeds with a fresh random revision
//! - `pull` moves the agent to the requested revision
//! - `sync` reports the agent's current revision
//!
//! Every call is logged twice, when it starts and when it finishes, so
//! tests can check that calls never overlap.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pdiff_core::{AgentId, Perspective, PerspectiveDiff, RevisionFingerprint};
use pdiff_store::{Backend, BackendError, Result};

/// The kind of backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Sync,
    Pull(RevisionFingerprint),
    Commit,
}

/// One entry in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Started(Op),
    Finished(Op),
}

#[derive(Default)]
struct Script {
    current: Option<RevisionFingerprint>,
    commits: VecDeque<Result<Option<RevisionFingerprint>>>,
    pulls: VecDeque<Result<Option<RevisionFingerprint>>>,
    syncs: VecDeque<Result<Option<RevisionFingerprint>>>,
    others: Vec<AgentId>,
    delay: Duration,
    calls: Vec<Call>,
    pull_requests: Vec<(RevisionFingerprint, bool)>,
    committed: Vec<PerspectiveDiff>,
    accepted: Vec<PerspectiveDiff>,
    commit_count: usize,
    active: bool,
}

/// A [`Backend`] driven by queued responses.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `n` failing commits.
    pub fn fail_commits(&self, n: usize, message: &str) {
        let mut script = self.lock();
        for _ in 0..n {
            script
                .commits
                .push_back(Err(BackendError::Remote(message.to_string())));
        }
    }

    pub fn push_commit(&self, response: Result<Option<RevisionFingerprint>>) {
        self.lock().commits.push_back(response);
    }

    pub fn push_pull(&self, response: Result<Option<RevisionFingerprint>>) {
        self.lock().pulls.push_back(response);
    }

    pub fn push_sync(&self, response: Result<Option<RevisionFingerprint>>) {
        self.lock().syncs.push_back(response);
    }

    /// Make every revision call take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = delay;
    }

    pub fn set_others(&self, others: Vec<AgentId>) {
        self.lock().others = others;
    }

    /// Set the revision the backend believes the agent is at.
    pub fn set_current(&self, revision: Option<RevisionFingerprint>) {
        self.lock().current = revision;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Every `(hash, is_scribe)` pull request, in order.
    pub fn pull_requests(&self) -> Vec<(RevisionFingerprint, bool)> {
        self.lock().pull_requests.clone()
    }

    /// Every diff handed to `commit`, including failed attempts.
    pub fn committed(&self) -> Vec<PerspectiveDiff> {
        self.lock().committed.clone()
    }

    /// Number of commit attempts started.
    pub fn commit_count(&self) -> usize {
        self.lock().commit_count
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn start(&self, op: Op) {
        let delay = {
            let mut script = self.lock();
            script.calls.push(Call::Started(op));
            script.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn finish(&self, op: Op) {
        self.lock().calls.push(Call::Finished(op));
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn sync(&self) -> Result<Option<RevisionFingerprint>> {
        self.start(Op::Sync).await;
        let response = {
            let mut script = self.lock();
            let response = script.syncs.pop_front().unwrap_or(Ok(script.current));
            if let Ok(Some(revision)) = &response {
                script.current = Some(*revision);
            }
            response
        };
        self.finish(Op::Sync);
        response
    }

    async fn pull(
        &self,
        hash: &RevisionFingerprint,
        is_scribe: bool,
    ) -> Result<Option<RevisionFingerprint>> {
        self.lock().pull_requests.push((*hash, is_scribe));
        self.start(Op::Pull(*hash)).await;
        let response = {
            let mut script = self.lock();
            let response = script.pulls.pop_front().unwrap_or(Ok(Some(*hash)));
            if let Ok(Some(revision)) = &response {
                script.current = Some(*revision);
            }
            response
        };
        self.finish(Op::Pull(*hash));
        response
    }

    async fn commit(&self, diff: &PerspectiveDiff) -> Result<Option<RevisionFingerprint>> {
        {
            let mut script = self.lock();
            script.commit_count += 1;
            script.committed.push(diff.clone());
        }
        self.start(Op::Commit).await;
        let response = {
            let mut script = self.lock();
            let response = script
                .commits
                .pop_front()
                .unwrap_or_else(|| Ok(Some(RevisionFingerprint::from_bytes(rand::random()))));
            if let Ok(revision) = &response {
                script.accepted.push(diff.clone());
                if let Some(revision) = revision {
                    script.current = Some(*revision);
                }
            }
            response
        };
        self.finish(Op::Commit);
        response
    }

    async fn current_revision(&self) -> Result<Option<RevisionFingerprint>> {
        Ok(self.lock().current)
    }

    async fn get_others(&self) -> Result<Vec<AgentId>> {
        Ok(self.lock().others.clone())
    }

    async fn add_active_agent_link(&self) -> Result<()> {
        self.lock().active = true;
        Ok(())
    }

    async fn render(&self) -> Result<Perspective> {
        let script = self.lock();
        let mut links = Vec::new();
        for diff in &script.accepted {
            links.extend(diff.additions.iter().cloned());
            links.retain(|link| !diff.removals.contains(link));
        }
        Ok(Perspective::new(links))
    }
}
