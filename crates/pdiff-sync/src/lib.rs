//! # pdiff sync
//!
//! Peer reconciliation for perspective-diff sync.
//!
//! ## Overview
//!
//! Each agent owns a [`SyncEngine`] over some [`pdiff_store::Backend`]. The
//! engine tracks which revision every live peer last announced, decides
//! whether the local agent has converged with them, and pulls any revision
//! it has not yet seen.
//!
//! ## Key Properties
//!
//! - **Serialized mutations**: `sync`, `commit` and each gossip cycle run
//!   under a single gate with a bounded wait
//! - **Lock-free ingestion**: heartbeats and echoes never wait on the gate
//! - **Majority convergence**: an agent is synced when its revision wins a
//!   strict majority of the distinct revisions it can see
//! - **Deterministic scribe**: the lexicographically first agent is scribe
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pdiff_core::AgentId;
//! use pdiff_store::MemoryNetwork;
//! use pdiff_sync::{SyncConfig, SyncEngine};
//!
//! async fn example() -> pdiff_sync::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let agent = AgentId::from("did:key:alice");
//!     let (backend, mut signals) = network.join(agent.clone());
//!
//!     let engine = SyncEngine::new(agent, backend, SyncConfig::default());
//!     let mut states = engine.subscribe_sync_state();
//!
//!     engine.sync().await?;
//!     while let Ok(signal) = signals.try_recv() {
//!         engine.ingest_signal(&signal).await;
//!     }
//!     let report = engine.gossip().await?;
//!     println!("cycle {} scribe={}", report.cycle, report.is_scribe);
//!     # let _ = states.try_recv();
//!     Ok(())
//! }
//! ```
//!
//! ## Gossip Cycle
//!
//! ```text
//! prune stale peers
//!   -> elect scribe
//!   -> classify local revision, notify
//!   -> for each distinct peer revision != local:
//!        pull(revision, is_scribe)
//!        if local revision moved: classify, notify
//!   -> every n-th cycle: log diagnostics
//! ```

pub mod convergence;
pub mod engine;
pub mod error;
pub mod gate;
pub mod ingest;
pub mod observer;
pub mod peers;
pub mod remote;
pub mod report;
pub mod retry;
pub mod scribe;

pub use convergence::{classify, Classification, ConvergenceReport};
pub use engine::{SyncConfig, SyncEngine};
pub use error::{Result, SyncError};
pub use gate::{GateGuard, MutationGate};
pub use ingest::{IngestOutcome, SignalIngestor};
pub use observer::Observers;
pub use peers::{PeerInfo, PeerTable};
pub use remote::{call_remote, RemoteOutcome};
pub use report::{Diagnostics, GossipReport, PeerLine};
pub use retry::{CommitOutcome, CommitRetrier, RetryPolicy};
pub use scribe::{elect, Election};
