//! In-memory implementation of the Backend trait.
//!
//! A [`MemoryNetwork`] stands in for the distributed store: it holds every
//! revision any agent has committed, each agent's current revision, and a
//! signal channel per agent. It is primarily for testing and keeps the same
//! observable behavior a real store has towards the sync engine: commits
//! broadcast heartbeats to other agents, pulls echo fetched diffs back to
//! the puller, and concurrent histories merge.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use pdiff_core::{
    AgentId, CoreError, DiffReference, LinkExpression, PeerBroadcast, Perspective,
    PerspectiveDiff, RevisionFingerprint,
};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{BackendError, Result};
use crate::traits::Backend;

/// Capacity of each agent's signal channel.
pub const SIGNAL_BUFFER: usize = 1000;

/// Number of recent `is_scribe` hints kept per agent.
pub const SCRIBE_HINT_HISTORY: usize = 64;

/// Shared state for the in-memory store network.
pub struct MemoryNetwork {
    inner: RwLock<NetworkInner>,
}

struct NetworkInner {
    /// Every revision ever committed, by fingerprint.
    revisions: HashMap<RevisionFingerprint, StoredRevision>,

    /// Joined agents.
    agents: BTreeMap<AgentId, AgentSlot>,

    /// Most recently published revision; what `sync` pulls.
    latest: Option<RevisionFingerprint>,

    /// Commit order, used to replay diffs deterministically.
    next_seq: u64,
}

struct StoredRevision {
    parents: Vec<RevisionFingerprint>,
    diff: PerspectiveDiff,
    seq: u64,
    depth: u64,
}

struct AgentSlot {
    current: Option<RevisionFingerprint>,
    signals: mpsc::Sender<Value>,
    active: bool,
    scribe_hints: VecDeque<bool>,
}

impl MemoryNetwork {
    /// Create a new empty network.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join an agent to the network.
    ///
    /// Returns the agent's backend handle and the receiving end of its
    /// signal channel. Re-joining replaces the previous channel.
    pub fn join(self: &Arc<Self>, agent: AgentId) -> (MemoryBackend, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);

        let mut inner = self.write();
        let current = inner.agents.get(&agent).and_then(|slot| slot.current);
        inner.agents.insert(
            agent.clone(),
            AgentSlot {
                current,
                signals: tx,
                active: false,
                scribe_hints: VecDeque::new(),
            },
        );

        let backend = MemoryBackend {
            agent,
            network: Arc::clone(self),
        };
        (backend, rx)
    }

    /// Number of distinct revisions stored.
    pub fn revision_count(&self) -> usize {
        self.read().revisions.len()
    }

    /// The revision `sync` would pull right now.
    pub fn latest(&self) -> Option<RevisionFingerprint> {
        self.read().latest
    }

    fn read(&self) -> RwLockReadGuard<'_, NetworkInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, NetworkInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self {
            inner: RwLock::new(NetworkInner {
                revisions: HashMap::new(),
                agents: BTreeMap::new(),
                latest: None,
                next_seq: 0,
            }),
        }
    }
}

impl NetworkInner {
    fn slot(&self, agent: &AgentId) -> Result<&AgentSlot> {
        self.agents
            .get(agent)
            .ok_or_else(|| BackendError::UnknownAgent(agent.clone()))
    }

    fn slot_mut(&mut self, agent: &AgentId) -> Result<&mut AgentSlot> {
        self.agents
            .get_mut(agent)
            .ok_or_else(|| BackendError::UnknownAgent(agent.clone()))
    }

    /// All revisions reachable from `head`, including `head`.
    fn ancestors(&self, head: &RevisionFingerprint) -> HashSet<RevisionFingerprint> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([*head]);

        while let Some(fp) = queue.pop_front() {
            if !seen.insert(fp) {
                continue;
            }
            if let Some(revision) = self.revisions.get(&fp) {
                queue.extend(revision.parents.iter().copied());
            }
        }

        seen
    }

    /// Concatenate the diffs of `revisions` in commit order.
    fn collect_diffs<'a>(
        &self,
        revisions: impl Iterator<Item = &'a RevisionFingerprint>,
    ) -> PerspectiveDiff {
        let mut stored: Vec<&StoredRevision> = revisions
            .filter_map(|fp| self.revisions.get(fp))
            .collect();
        stored.sort_by_key(|r| r.seq);

        let mut diff = PerspectiveDiff::default();
        for revision in stored {
            diff.extend(revision.diff.clone());
        }
        diff
    }

    fn insert_revision(
        &mut self,
        parents: Vec<RevisionFingerprint>,
        diff: PerspectiveDiff,
    ) -> Result<(RevisionFingerprint, DiffReference)> {
        let bytes = encode_diff(&diff)?;
        let content_hash = RevisionFingerprint::derive(&[], &bytes);
        let fp = RevisionFingerprint::derive(&parents, &bytes);

        let depth = parents
            .iter()
            .filter_map(|p| self.revisions.get(p))
            .map(|r| r.depth)
            .max()
            .unwrap_or(0)
            + 1;

        let reference = DiffReference {
            diff: content_hash,
            parents: if parents.is_empty() {
                None
            } else {
                Some(parents.clone())
            },
            diffs_since_snapshot: depth,
        };

        if !self.revisions.contains_key(&fp) {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.revisions.insert(
                fp,
                StoredRevision {
                    parents,
                    diff,
                    seq,
                    depth,
                },
            );
        }

        Ok((fp, reference))
    }

    /// Deliver a heartbeat to every agent except the author.
    ///
    /// Delivery is best effort: a full or closed channel drops the signal.
    fn broadcast(&self, broadcast: &PeerBroadcast) -> Result<()> {
        let payload = broadcast.to_payload()?;
        for (agent, slot) in &self.agents {
            if agent != &broadcast.broadcast_author {
                let _ = slot.signals.try_send(payload.clone());
            }
        }
        Ok(())
    }

    /// Re-deliver fetched diffs to the agent that fetched them.
    fn echo(&self, agent: &AgentId, diff: &PerspectiveDiff) -> Result<()> {
        if diff.is_empty() {
            return Ok(());
        }
        let payload = serde_json::to_value(diff).map_err(CoreError::from)?;
        if self.slot(agent)?.signals.try_send(payload).is_err() {
            tracing::debug!("dropped echo signal for {}", agent);
        }
        Ok(())
    }

    fn pull_into(
        &mut self,
        agent: &AgentId,
        hash: &RevisionFingerprint,
        is_scribe: bool,
    ) -> Result<Option<RevisionFingerprint>> {
        let hints = &mut self.slot_mut(agent)?.scribe_hints;
        if hints.len() == SCRIBE_HINT_HISTORY {
            hints.pop_front();
        }
        hints.push_back(is_scribe);

        if !self.revisions.contains_key(hash) {
            return Err(BackendError::UnknownRevision(*hash));
        }

        let their_ancestors = self.ancestors(hash);

        let Some(mine) = self.slot(agent)?.current else {
            let diff = self.collect_diffs(their_ancestors.iter());
            self.slot_mut(agent)?.current = Some(*hash);
            self.echo(agent, &diff)?;
            return Ok(Some(*hash));
        };

        let my_ancestors = self.ancestors(&mine);
        if my_ancestors.contains(hash) {
            return Ok(None);
        }

        let missing = self.collect_diffs(their_ancestors.difference(&my_ancestors));

        if their_ancestors.contains(&mine) {
            self.slot_mut(agent)?.current = Some(*hash);
            self.echo(agent, &missing)?;
            return Ok(Some(*hash));
        }

        // Divergent histories: merge with sorted parents so that agents
        // merging the same pair independently land on the same revision.
        let mut parents = vec![mine, *hash];
        parents.sort();
        let (merge, reference) = self.insert_revision(parents, PerspectiveDiff::default())?;

        self.slot_mut(agent)?.current = Some(merge);
        self.latest = Some(merge);
        self.echo(agent, &missing)?;
        self.broadcast(&PeerBroadcast {
            diff: PerspectiveDiff::default(),
            reference_hash: merge,
            reference,
            broadcast_author: agent.clone(),
        })?;

        Ok(Some(merge))
    }
}

fn encode_diff(diff: &PerspectiveDiff) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(diff, &mut buf).map_err(|e| CoreError::Encoding(e.to_string()))?;
    Ok(buf)
}

/// One agent's view of a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryBackend {
    agent: AgentId,
    network: Arc<MemoryNetwork>,
}

impl MemoryBackend {
    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    pub fn network(&self) -> &Arc<MemoryNetwork> {
        &self.network
    }

    /// The most recent `is_scribe` hints this agent has passed to `pull`,
    /// oldest first. At most [`SCRIBE_HINT_HISTORY`] are kept.
    pub fn scribe_hints(&self) -> Vec<bool> {
        self.network
            .read()
            .agents
            .get(&self.agent)
            .map(|slot| slot.scribe_hints.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `add_active_agent_link` has been called for this agent.
    pub fn is_active(&self) -> bool {
        self.network
            .read()
            .agents
            .get(&self.agent)
            .is_some_and(|slot| slot.active)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn sync(&self) -> Result<Option<RevisionFingerprint>> {
        let mut inner = self.network.write();

        if let Some(latest) = inner.latest {
            inner.pull_into(&self.agent, &latest, false)?;
        }

        Ok(inner.slot(&self.agent)?.current)
    }

    async fn pull(
        &self,
        hash: &RevisionFingerprint,
        is_scribe: bool,
    ) -> Result<Option<RevisionFingerprint>> {
        let mut inner = self.network.write();
        inner.pull_into(&self.agent, hash, is_scribe)
    }

    async fn commit(&self, diff: &PerspectiveDiff) -> Result<Option<RevisionFingerprint>> {
        let mut inner = self.network.write();

        let parents: Vec<RevisionFingerprint> =
            inner.slot(&self.agent)?.current.into_iter().collect();
        let (fp, reference) = inner.insert_revision(parents, diff.clone())?;

        inner.slot_mut(&self.agent)?.current = Some(fp);
        inner.latest = Some(fp);
        inner.broadcast(&PeerBroadcast {
            diff: diff.clone(),
            reference_hash: fp,
            reference,
            broadcast_author: self.agent.clone(),
        })?;

        tracing::debug!("{} committed revision {}", self.agent, fp);
        Ok(Some(fp))
    }

    async fn current_revision(&self) -> Result<Option<RevisionFingerprint>> {
        Ok(self.network.read().slot(&self.agent)?.current)
    }

    async fn get_others(&self) -> Result<Vec<AgentId>> {
        let inner = self.network.read();
        Ok(inner
            .agents
            .keys()
            .filter(|id| *id != &self.agent)
            .cloned()
            .collect())
    }

    async fn add_active_agent_link(&self) -> Result<()> {
        self.network.write().slot_mut(&self.agent)?.active = true;
        Ok(())
    }

    async fn render(&self) -> Result<Perspective> {
        let inner = self.network.read();

        let Some(current) = inner.slot(&self.agent)?.current else {
            return Ok(Perspective::default());
        };

        let mut history: Vec<&StoredRevision> = inner
            .ancestors(&current)
            .iter()
            .filter_map(|fp| inner.revisions.get(fp))
            .collect();
        history.sort_by_key(|r| r.seq);

        let mut links: Vec<LinkExpression> = Vec::new();
        for revision in history {
            for addition in &revision.diff.additions {
                if !links.contains(addition) {
                    links.push(addition.clone());
                }
            }
            for removal in &revision.diff.removals {
                links.retain(|link| link != removal);
            }
        }

        Ok(Perspective::new(links))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdiff_core::{Link, SignalEnvelope};

    fn addition(author: &str, target: &str) -> PerspectiveDiff {
        let link = Link::new("ad4m://self", None, target);
        PerspectiveDiff::new(vec![LinkExpression::new(author, "t", link)], vec![])
    }

    #[tokio::test]
    async fn test_commit_broadcasts_heartbeat_to_others() {
        let network = MemoryNetwork::new();
        let (alice, mut alice_rx) = network.join(AgentId::from("did:alice"));
        let (_bob, mut bob_rx) = network.join(AgentId::from("did:bob"));

        let fp = alice.commit(&addition("did:alice", "a")).await.unwrap().unwrap();

        let signal = bob_rx.try_recv().unwrap();
        match SignalEnvelope::classify(&signal).unwrap() {
            SignalEnvelope::Heartbeat(b) => {
                assert_eq!(b.reference_hash, fp);
                assert_eq!(b.broadcast_author, AgentId::from("did:alice"));
                assert_eq!(b.reference.parents, None);
            }
            other => panic!("expected heartbeat, got {:?}", other),
        }

        // The author hears nothing about its own commit.
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pull_fast_forwards_and_echoes() {
        let network = MemoryNetwork::new();
        let (alice, _alice_rx) = network.join(AgentId::from("did:alice"));
        let (bob, mut bob_rx) = network.join(AgentId::from("did:bob"));

        let fp = alice.commit(&addition("did:alice", "a")).await.unwrap().unwrap();
        let _heartbeat = bob_rx.try_recv().unwrap();

        assert_eq!(bob.pull(&fp, true).await.unwrap(), Some(fp));
        assert_eq!(bob.current_revision().await.unwrap(), Some(fp));
        assert_eq!(bob.scribe_hints(), vec![true]);

        match SignalEnvelope::classify(&bob_rx.try_recv().unwrap()).unwrap() {
            SignalEnvelope::Echo(diff) => assert_eq!(diff.additions.len(), 1),
            other => panic!("expected echo, got {:?}", other),
        }

        // Pulling what we already have is a no-op.
        assert_eq!(bob.pull(&fp, false).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_divergent_histories_merge_to_same_revision() {
        let network = MemoryNetwork::new();
        let (alice, _alice_rx) = network.join(AgentId::from("did:alice"));
        let (bob, _bob_rx) = network.join(AgentId::from("did:bob"));

        let a = alice.commit(&addition("did:alice", "a")).await.unwrap().unwrap();
        let b = bob.commit(&addition("did:bob", "b")).await.unwrap().unwrap();

        let merged_by_alice = alice.pull(&b, true).await.unwrap().unwrap();
        let merged_by_bob = bob.pull(&a, false).await.unwrap().unwrap();

        assert_eq!(merged_by_alice, merged_by_bob);
        assert_eq!(alice.render().await.unwrap(), bob.render().await.unwrap());
        assert_eq!(alice.render().await.unwrap().links.len(), 2);
    }

    #[tokio::test]
    async fn test_render_applies_removals() {
        let network = MemoryNetwork::new();
        let (alice, _rx) = network.join(AgentId::from("did:alice"));

        let added = addition("did:alice", "a");
        alice.commit(&added).await.unwrap();
        alice
            .commit(&PerspectiveDiff::new(vec![], added.additions.clone()))
            .await
            .unwrap();

        assert!(alice.render().await.unwrap().links.is_empty());
    }

    #[tokio::test]
    async fn test_pull_unknown_revision_fails() {
        let network = MemoryNetwork::new();
        let (alice, _rx) = network.join(AgentId::from("did:alice"));

        let unknown = RevisionFingerprint::from_bytes([9; 32]);
        assert!(matches!(
            alice.pull(&unknown, false).await,
            Err(BackendError::UnknownRevision(fp)) if fp == unknown
        ));
    }

    #[tokio::test]
    async fn test_scribe_hint_history_is_bounded() {
        let network = MemoryNetwork::new();
        let (alice, _rx) = network.join(AgentId::from("did:alice"));
        let unknown = RevisionFingerprint::from_bytes([9; 32]);

        for _ in 0..SCRIBE_HINT_HISTORY * 3 {
            let _ = alice.pull(&unknown, false).await;
        }
        let _ = alice.pull(&unknown, true).await;

        let hints = alice.scribe_hints();
        assert_eq!(hints.len(), SCRIBE_HINT_HISTORY);
        assert_eq!(hints.last(), Some(&true));
        assert_eq!(hints.iter().filter(|hint| **hint).count(), 1);
    }

    #[tokio::test]
    async fn test_sync_pulls_latest() {
        let network = MemoryNetwork::new();
        let (alice, _alice_rx) = network.join(AgentId::from("did:alice"));
        let (bob, _bob_rx) = network.join(AgentId::from("did:bob"));

        assert_eq!(bob.sync().await.unwrap(), None);

        let fp = alice.commit(&addition("did:alice", "a")).await.unwrap().unwrap();
        assert_eq!(bob.sync().await.unwrap(), Some(fp));
        assert_eq!(network.latest(), Some(fp));
    }

    #[tokio::test]
    async fn test_others_and_active_link() {
        let network = MemoryNetwork::new();
        let (alice, _a) = network.join(AgentId::from("did:alice"));
        let (_bob, _b) = network.join(AgentId::from("did:bob"));

        assert_eq!(alice.get_others().await.unwrap(), vec![AgentId::from("did:bob")]);

        assert!(!alice.is_active());
        alice.add_active_agent_link().await.unwrap();
        assert!(alice.is_active());
    }
}
