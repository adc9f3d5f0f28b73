//! Peer liveness tracking.
//!
//! Every heartbeat refreshes the sending peer's revision and last-seen time.
//! The gossip cycle prunes peers that have gone quiet before it looks at
//! anyone's revision.
//!
//! The table has its own lock, separate from the mutation gate, because
//! heartbeats are ingested while a gossip cycle is running.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use pdiff_core::{AgentId, RevisionFingerprint};
use tokio::time::Instant;

/// What we know about one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// The last revision the peer announced.
    pub current_revision: Option<RevisionFingerprint>,
    /// When the peer was last heard from.
    pub last_seen: Instant,
}

/// Known peers, keyed and ordered by agent id.
pub struct PeerTable {
    local: AgentId,
    peers: RwLock<BTreeMap<AgentId, PeerInfo>>,
}

impl PeerTable {
    /// Create an empty table for the given local agent.
    pub fn new(local: AgentId) -> Self {
        Self {
            local,
            peers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Record a heartbeat from `peer`, stamped with the current time.
    ///
    /// Returns `false` if `peer` is the local agent, which is never tracked.
    pub fn upsert(&self, peer: AgentId, revision: Option<RevisionFingerprint>) -> bool {
        self.upsert_at(peer, revision, Instant::now())
    }

    /// Record a heartbeat from `peer` seen at `at`.
    pub fn upsert_at(
        &self,
        peer: AgentId,
        revision: Option<RevisionFingerprint>,
        at: Instant,
    ) -> bool {
        if peer == self.local {
            return false;
        }
        self.write().insert(
            peer,
            PeerInfo {
                current_revision: revision,
                last_seen: at,
            },
        );
        true
    }

    /// Remove every peer not heard from within `threshold` of `now`.
    ///
    /// A peer is stale when `last_seen + threshold < now`; one seen exactly
    /// `threshold` ago is kept. Returns the removed ids.
    pub fn prune_stale(&self, now: Instant, threshold: Duration) -> Vec<AgentId> {
        let mut peers = self.write();

        let lost: Vec<AgentId> = peers
            .iter()
            .filter(|(_, info)| info.last_seen + threshold < now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &lost {
            peers.remove(id);
        }

        lost
    }

    /// Peers and their revisions, ordered by agent id.
    pub fn snapshot(&self) -> Vec<(AgentId, Option<RevisionFingerprint>)> {
        self.read()
            .iter()
            .map(|(id, info)| (id.clone(), info.current_revision))
            .collect()
    }

    /// Full peer entries, ordered by agent id.
    pub fn entries(&self) -> Vec<(AgentId, PeerInfo)> {
        self.read()
            .iter()
            .map(|(id, info)| (id.clone(), info.clone()))
            .collect()
    }

    pub fn get(&self, peer: &AgentId) -> Option<PeerInfo> {
        self.read().get(peer).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<AgentId, PeerInfo>> {
        self.peers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<AgentId, PeerInfo>> {
        self.peers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Distinct revisions in first-seen order, skipping peers with none.
pub fn distinct_revisions(
    snapshot: &[(AgentId, Option<RevisionFingerprint>)],
) -> Vec<RevisionFingerprint> {
    let mut revisions: Vec<RevisionFingerprint> = Vec::with_capacity(snapshot.len());
    for revision in snapshot.iter().filter_map(|(_, r)| *r) {
        if !revisions.contains(&revision) {
            revisions.push(revision);
        }
    }
    revisions
}
