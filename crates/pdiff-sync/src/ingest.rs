//! Signal ingestion.
//!
//! Inbound signals are either a peer's broadcast, which refreshes that peer
//! in the peer table, or an echo of our own mutation, which goes to the link
//! observer. Ingestion never takes the mutation gate and never fails
//! outward: problems are logged and the signal is dropped.

use pdiff_core::{AgentId, SignalEnvelope};
use serde_json::Value;

use crate::observer::Observers;
use crate::peers::PeerTable;

/// What happened to an ingested signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A peer's revision and liveness were refreshed.
    PeerUpdated(AgentId),
    /// A broadcast claiming to come from the local agent; ignored.
    OwnBroadcast,
    /// An echo was handed to the link observer.
    Forwarded,
    /// An echo was dropped: no link observer is registered or it is a full
    /// buffer behind.
    NoObserver,
    /// The payload matched neither known shape.
    Malformed,
}

pub struct SignalIngestor<'a> {
    peers: &'a PeerTable,
    observers: &'a Observers,
}

impl<'a> SignalIngestor<'a> {
    pub fn new(peers: &'a PeerTable, observers: &'a Observers) -> Self {
        Self { peers, observers }
    }

    /// Classify and apply a raw signal payload.
    pub async fn ingest(&self, payload: &Value) -> IngestOutcome {
        match SignalEnvelope::classify(payload) {
            Ok(envelope) => self.ingest_envelope(envelope).await,
            Err(e) => {
                tracing::debug!("dropping signal: {}", e);
                IngestOutcome::Malformed
            }
        }
    }

    /// Apply an already classified signal.
    pub async fn ingest_envelope(&self, envelope: SignalEnvelope) -> IngestOutcome {
        match envelope {
            SignalEnvelope::Heartbeat(broadcast) => {
                let author = broadcast.broadcast_author;
                if self.peers.upsert(author.clone(), Some(broadcast.reference_hash)) {
                    tracing::debug!("heartbeat from {} at {}", author, broadcast.reference_hash);
                    IngestOutcome::PeerUpdated(author)
                } else {
                    IngestOutcome::OwnBroadcast
                }
            }
            SignalEnvelope::Echo(diff) => {
                if self.observers.notify_links(diff) {
                    IngestOutcome::Forwarded
                } else {
                    IngestOutcome::NoObserver
                }
            }
        }
    }
}
