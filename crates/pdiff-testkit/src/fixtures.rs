//! Test fixtures and helpers.
//!
//! Common setup code for unit and integration tests.

use std::sync::Arc;

use pdiff_core::{
    AgentId, DiffReference, Link, LinkExpression, PeerBroadcast, PerspectiveDiff,
    RevisionFingerprint,
};
use pdiff_store::{MemoryBackend, MemoryNetwork};
use serde_json::Value;
use tokio::sync::mpsc;

/// Fixed timestamp used for fixture links.
pub const TIMESTAMP: &str = "2024-01-01T00:00:00.000Z";

/// A fingerprint filled with one byte.
pub fn fingerprint(byte: u8) -> RevisionFingerprint {
    RevisionFingerprint::from_bytes([byte; 32])
}

/// `n` agent ids in ascending order: `did:test:00`, `did:test:01`, ...
pub fn agents(n: usize) -> Vec<AgentId> {
    (0..n).map(|i| AgentId::new(format!("did:test:{:02}", i))).collect()
}

/// A link expression authored by `author` with no predicate.
pub fn link(author: &str, source: &str, target: &str) -> LinkExpression {
    LinkExpression::new(author, TIMESTAMP, Link::new(source, None, target))
}

/// A link expression with a predicate.
pub fn link_with_predicate(
    author: &str,
    source: &str,
    predicate: &str,
    target: &str,
) -> LinkExpression {
    LinkExpression::new(author, TIMESTAMP, Link::new(source, Some(predicate), target))
}

/// A diff adding one link per `(source, target)` pair.
pub fn diff_adding(author: &str, pairs: &[(&str, &str)]) -> PerspectiveDiff {
    let additions = pairs
        .iter()
        .map(|(source, target)| link(author, source, target))
        .collect();
    PerspectiveDiff::new(additions, Vec::new())
}

/// A diff removing one link per `(source, target)` pair.
pub fn diff_removing(author: &str, pairs: &[(&str, &str)]) -> PerspectiveDiff {
    let removals = pairs
        .iter()
        .map(|(source, target)| link(author, source, target))
        .collect();
    PerspectiveDiff::new(Vec::new(), removals)
}

/// A peer broadcast announcing `revision`, as the store would send it.
pub fn broadcast(author: &str, revision: RevisionFingerprint) -> PeerBroadcast {
    PeerBroadcast {
        diff: PerspectiveDiff::default(),
        reference_hash: revision,
        reference: DiffReference {
            diff: revision,
            parents: None,
            diffs_since_snapshot: 0,
        },
        broadcast_author: AgentId::from(author),
    }
}

/// The raw payload of [`broadcast`].
pub fn heartbeat_payload(author: &str, revision: RevisionFingerprint) -> Value {
    serde_json::json!({
        "diff": { "additions": [], "removals": [] },
        "reference_hash": revision.to_hex(),
        "reference": {
            "diff": revision.to_hex(),
            "parents": null,
            "diffs_since_snapshot": 0,
        },
        "broadcast_author": author,
    })
}

/// Agents joined to one in-memory network.
pub struct NetworkFixture {
    pub network: Arc<MemoryNetwork>,
    pub members: Vec<(MemoryBackend, mpsc::Receiver<Value>)>,
}

impl NetworkFixture {
    /// Join `n` agents from [`agents`] to a fresh network.
    pub fn new(n: usize) -> Self {
        let network = MemoryNetwork::new();
        let members = agents(n)
            .into_iter()
            .map(|agent| network.join(agent))
            .collect();
        Self { network, members }
    }

    /// Drain every signal currently queued for member `index`.
    pub fn drain(&mut self, index: usize) -> Vec<Value> {
        let mut signals = Vec::new();
        if let Some((_, rx)) = self.members.get_mut(index) {
            while let Ok(signal) = rx.try_recv() {
                signals.push(signal);
            }
        }
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdiff_core::SignalEnvelope;

    #[test]
    fn test_heartbeat_payload_matches_broadcast() {
        let payload = heartbeat_payload("did:peer", fingerprint(3));
        let envelope = SignalEnvelope::classify(&payload).unwrap();
        assert_eq!(
            envelope,
            SignalEnvelope::Heartbeat(broadcast("did:peer", fingerprint(3)))
        );
    }

    #[tokio::test]
    async fn test_network_fixture_delivers_heartbeats() {
        use pdiff_store::Backend;

        let mut fixture = NetworkFixture::new(2);
        let revision = fixture.members[0]
            .0
            .commit(&diff_adding("did:test:00", &[("a", "b")]))
            .await
            .unwrap()
            .unwrap();

        assert!(fixture.drain(0).is_empty());
        let signals = fixture.drain(1);
        assert_eq!(signals.len(), 1);
        match SignalEnvelope::classify(&signals[0]).unwrap() {
            SignalEnvelope::Heartbeat(broadcast) => assert_eq!(broadcast.reference_hash, revision),
            other => panic!("expected heartbeat, got {:?}", other),
        }
        assert_eq!(fixture.network.revision_count(), 1);
    }

    #[test]
    fn test_agents_are_sorted() {
        let ids = agents(12);
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
