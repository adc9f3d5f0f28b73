//! The reconciliation engine.
//!
//! Ties the peer table, scribe election, convergence classification and the
//! mutation gate together behind four entry points: `sync`, `commit`,
//! `gossip` and `ingest_signal`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pdiff_core::{AgentId, PerspectiveDiff, RevisionFingerprint, SignalEnvelope, SyncState};
use pdiff_store::Backend;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::convergence::{classify, ConvergenceReport};
use crate::error::Result;
use crate::gate::{GateGuard, MutationGate};
use crate::ingest::{IngestOutcome, SignalIngestor};
use crate::observer::{spawn_callback, Observers};
use crate::peers::{distinct_revisions, PeerTable};
use crate::remote::{call_remote, RemoteOutcome};
use crate::report::{Diagnostics, GossipReport, PeerLine};
use crate::retry::{CommitOutcome, CommitRetrier, RetryPolicy};
use crate::scribe::Election;

/// Configuration for engine behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Longest wait for the mutation gate before failing.
    pub gate_timeout: Duration,
    /// Peers silent for longer than this are pruned.
    pub peer_staleness: Duration,
    /// Emit the diagnostic summary every n-th gossip cycle (0 disables it).
    pub diagnostics_every: u64,
    /// Total commit attempts.
    pub commit_attempts: u32,
    /// Linear commit backoff step.
    pub commit_backoff: Duration,
    /// Bound on each backing-store call; `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
    /// Capacity of each observer channel.
    pub event_buffer: usize,
}

impl SyncConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.commit_attempts,
            backoff: self.commit_backoff,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            gate_timeout: Duration::from_secs(10),
            peer_staleness: Duration::from_secs(10),
            diagnostics_every: 10,
            commit_attempts: 5,
            commit_backoff: Duration::from_millis(100),
            call_timeout: None,
            event_buffer: 64,
        }
    }
}

/// Peer reconciliation engine for one local agent.
pub struct SyncEngine<B: Backend> {
    agent: AgentId,
    backend: Arc<B>,
    config: SyncConfig,
    gate: MutationGate,
    peers: PeerTable,
    observers: Observers,
    cycles: AtomicU64,
}

impl<B: Backend> SyncEngine<B> {
    /// Create an engine with no known revision.
    pub fn new(agent: AgentId, backend: B, config: SyncConfig) -> Self {
        Self::with_backend(agent, Arc::new(backend), config)
    }

    /// Create an engine over a shared backend handle.
    pub fn with_backend(agent: AgentId, backend: Arc<B>, config: SyncConfig) -> Self {
        Self {
            gate: MutationGate::new(None, config.gate_timeout),
            peers: PeerTable::new(agent.clone()),
            observers: Observers::new(config.event_buffer),
            cycles: AtomicU64::new(0),
            agent,
            backend,
            config,
        }
    }

    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// The last revision written through the gate, without waiting for it.
    pub fn current_revision(&self) -> Option<RevisionFingerprint> {
        self.gate.snapshot()
    }

    /// Watch the local revision change.
    pub fn watch_revision(&self) -> watch::Receiver<Option<RevisionFingerprint>> {
        self.gate.watch()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observers
    // ─────────────────────────────────────────────────────────────────────────

    /// Receive sync-state changes. Replaces any earlier subscriber.
    pub fn subscribe_sync_state(&self) -> mpsc::Receiver<SyncState> {
        self.observers.subscribe_sync_state()
    }

    /// Receive echoed link diffs. Replaces any earlier subscriber.
    pub fn subscribe_links(&self) -> mpsc::Receiver<PerspectiveDiff> {
        self.observers.subscribe_links()
    }

    /// Call `callback` for every sync-state change, on a separate task.
    pub fn add_sync_state_callback<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnMut(SyncState) + Send + 'static,
    {
        spawn_callback(self.observers.subscribe_sync_state(), callback)
    }

    /// Call `callback` for every echoed link diff, on a separate task.
    pub fn add_link_callback<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnMut(PerspectiveDiff) + Send + 'static,
    {
        spawn_callback(self.observers.subscribe_links(), callback)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Pull the authoritative state, then run one gossip cycle.
    ///
    /// The returned diff is always empty: whatever the pull fetched arrives
    /// through the signal channel as an echo.
    pub async fn sync(&self) -> Result<PerspectiveDiff> {
        {
            let mut gate = self.acquire_gate("sync").await?;
            match call_remote(self.config.call_timeout, self.backend.sync()).await {
                RemoteOutcome::Ok(Some(revision)) => gate.set_revision(revision),
                RemoteOutcome::Ok(None) => {}
                RemoteOutcome::RemoteFailed(e) => tracing::warn!("sync failed: {}", e),
                RemoteOutcome::Timeout(bound) => {
                    tracing::warn!("sync timed out after {:?}", bound)
                }
            }
        }

        if let Err(e) = self.gossip().await {
            tracing::warn!("gossip after sync failed: {}", e);
        }

        Ok(PerspectiveDiff::default())
    }

    /// Normalize and commit a diff, retrying within the attempt budget.
    pub async fn commit(&self, diff: &PerspectiveDiff) -> Result<CommitOutcome> {
        let mut gate = self.acquire_gate("commit").await?;
        let normalized = diff.normalized();

        let retrier = CommitRetrier::new(
            self.backend.as_ref(),
            self.config.retry_policy(),
            self.config.call_timeout,
        );
        Ok(retrier.run(&mut gate, &normalized).await)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Gossip
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one reconciliation cycle.
    pub async fn gossip(&self) -> Result<GossipReport> {
        let mut gate = self.acquire_gate("gossip").await?;
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(self.run_cycle(&mut gate, cycle).await)
    }

    async fn run_cycle(&self, gate: &mut GateGuard<'_>, cycle: u64) -> GossipReport {
        let lost_peers = self
            .peers
            .prune_stale(Instant::now(), self.config.peer_staleness);
        if !lost_peers.is_empty() {
            tracing::debug!("pruned {} stale peers: {:?}", lost_peers.len(), lost_peers);
        }

        let snapshot = self.peers.snapshot();
        let election = Election::new(&self.agent, snapshot.iter().map(|(id, _)| id.clone()));
        let revisions = distinct_revisions(&snapshot);

        let mut report = GossipReport {
            cycle,
            is_scribe: election.is_scribe(),
            lost_peers,
            ..GossipReport::default()
        };

        self.check_sync_state(gate.revision(), &revisions, &mut report)
            .await;

        for hash in &revisions {
            if gate.revision().as_ref() == Some(hash) {
                continue;
            }

            report.pulls_issued += 1;
            let pulled = call_remote(
                self.config.call_timeout,
                self.backend.pull(hash, election.is_scribe()),
            )
            .await;

            match pulled {
                RemoteOutcome::Ok(Some(revision)) if gate.revision() != Some(revision) => {
                    gate.set_revision(revision);
                    self.check_sync_state(Some(revision), &revisions, &mut report)
                        .await;
                }
                RemoteOutcome::Ok(_) => {}
                RemoteOutcome::RemoteFailed(e) => {
                    report.pulls_failed += 1;
                    tracing::warn!("pull of {} failed: {}", hash, e);
                }
                RemoteOutcome::Timeout(bound) => {
                    report.pulls_failed += 1;
                    tracing::warn!("pull of {} timed out after {:?}", hash, bound);
                }
            }
        }

        if self.config.diagnostics_every > 0 && cycle % self.config.diagnostics_every == 0 {
            let diagnostics = self.diagnostics(&election, revisions).await;
            tracing::info!("\n{}", diagnostics);
            report.diagnostics = Some(diagnostics);
        }

        report
    }

    /// Classify and notify the sync-state observer.
    async fn check_sync_state(
        &self,
        local: Option<RevisionFingerprint>,
        revisions: &[RevisionFingerprint],
        report: &mut GossipReport,
    ) {
        let convergence: ConvergenceReport = classify(local.as_ref(), revisions);
        if let Some(state) = convergence.classification.sync_state() {
            self.observers.notify_sync_state(state);
        }
        report.classifications.push(convergence);
    }

    async fn diagnostics(
        &self,
        election: &Election,
        revisions: Vec<RevisionFingerprint>,
    ) -> Diagnostics {
        let others = call_remote(self.config.call_timeout, self.backend.get_others())
            .await
            .into_result()
            .unwrap_or_else(|e| {
                tracing::warn!("could not list other agents: {}", e);
                Vec::new()
            });

        let now = Instant::now();
        let peers = self
            .peers
            .entries()
            .into_iter()
            .map(|(agent, info)| PeerLine {
                agent,
                revision: info.current_revision,
                since_seen: now.saturating_duration_since(info.last_seen),
            })
            .collect();

        Diagnostics {
            agent: self.agent.clone(),
            is_scribe: election.is_scribe(),
            others,
            peers,
            revisions,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Signals
    // ─────────────────────────────────────────────────────────────────────────

    /// Ingest a raw signal payload from the transport.
    pub async fn ingest_signal(&self, payload: &Value) -> IngestOutcome {
        SignalIngestor::new(&self.peers, &self.observers)
            .ingest(payload)
            .await
    }

    /// Ingest an already classified signal.
    pub async fn ingest_envelope(&self, envelope: SignalEnvelope) -> IngestOutcome {
        SignalIngestor::new(&self.peers, &self.observers)
            .ingest_envelope(envelope)
            .await
    }

    async fn acquire_gate(&self, operation: &str) -> Result<GateGuard<'_>> {
        self.gate.acquire().await.map_err(|e| {
            tracing::error!("{}: {}", operation, e);
            e
        })
    }
}
