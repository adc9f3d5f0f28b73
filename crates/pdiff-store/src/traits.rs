//! Backend trait: the opaque remote interface onto the backing store.
//!
//! The sync engine treats every method as a remote call that may fail or
//! hang. Implementations decide what a revision is, how histories merge and
//! how peers are told about new revisions.

use async_trait::async_trait;
use pdiff_core::{AgentId, Perspective, PerspectiveDiff, RevisionFingerprint};

use crate::error::Result;

/// Async interface to the backing store, as seen by one agent.
///
/// # Design Notes
///
/// - **Revisions are opaque**: callers only compare the fingerprints returned.
/// - **Signals are out of band**: diffs fetched by `sync` or `pull` reach the
///   caller through the signal channel, never as a return value.
/// - **`None` means "no new revision"**: a call that succeeded without
///   moving the agent's revision returns `Ok(None)`.
#[async_trait]
pub trait Backend: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Revision Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Pull the authoritative state of the network.
    ///
    /// Returns the agent's revision after the pull.
    async fn sync(&self) -> Result<Option<RevisionFingerprint>>;

    /// Catch up to a specific revision seen on a peer.
    ///
    /// `is_scribe` is a coordination hint passed through unchanged.
    /// Returns the agent's new revision if the pull moved it.
    async fn pull(
        &self,
        hash: &RevisionFingerprint,
        is_scribe: bool,
    ) -> Result<Option<RevisionFingerprint>>;

    /// Commit a normalized diff on top of the agent's current revision.
    async fn commit(&self, diff: &PerspectiveDiff) -> Result<Option<RevisionFingerprint>>;

    /// The revision the store currently holds for this agent.
    async fn current_revision(&self) -> Result<Option<RevisionFingerprint>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Network Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// List the other agents the store knows about.
    async fn get_others(&self) -> Result<Vec<AgentId>>;

    /// Announce this agent as an active participant.
    async fn add_active_agent_link(&self) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Materialization
    // ─────────────────────────────────────────────────────────────────────────

    /// Materialize the link set at the agent's current revision.
    async fn render(&self) -> Result<Perspective>;
}
