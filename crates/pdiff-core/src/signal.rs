//! Inbound signal envelopes.
//!
//! The transport hands the engine raw JSON payloads. Two shapes are
//! recognized:
//!
//! - a peer broadcast carrying `diff`, `reference_hash`, `reference` and
//!   `broadcast_author`, which doubles as that peer's heartbeat;
//! - a bare link diff, which is the backing store re-delivering one of our
//!   own mutations (a fast-forward or merge during a pull).
//!
//! Anything else is malformed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::fingerprint::RevisionFingerprint;
use crate::link::PerspectiveDiff;
use crate::types::AgentId;

const BROADCAST_FIELDS: [&str; 4] = ["diff", "reference_hash", "reference", "broadcast_author"];

/// Where a broadcast revision sits in its author's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffReference {
    /// Content hash of the diff this revision introduced.
    pub diff: RevisionFingerprint,
    /// Parent revisions; absent for a root revision.
    #[serde(default)]
    pub parents: Option<Vec<RevisionFingerprint>>,
    #[serde(default)]
    pub diffs_since_snapshot: u64,
}

/// A peer's announcement of a new revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerBroadcast {
    pub diff: PerspectiveDiff,
    pub reference_hash: RevisionFingerprint,
    pub reference: DiffReference,
    pub broadcast_author: AgentId,
}

impl PeerBroadcast {
    pub fn to_payload(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// A classified inbound signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalEnvelope {
    /// Another agent's broadcast; refreshes that agent's liveness.
    Heartbeat(PeerBroadcast),
    /// Our own mutation echoed back by the backing store.
    Echo(PerspectiveDiff),
}

impl SignalEnvelope {
    /// Classify a raw signal payload.
    pub fn classify(payload: &Value) -> Result<Self> {
        let object = payload
            .as_object()
            .ok_or_else(|| CoreError::MalformedSignal("payload is not an object".into()))?;

        let is_broadcast = BROADCAST_FIELDS
            .iter()
            .all(|key| object.get(*key).is_some_and(|v| !v.is_null()));

        if is_broadcast {
            let broadcast = PeerBroadcast::deserialize(payload)
                .map_err(|e| CoreError::MalformedSignal(format!("broadcast: {}", e)))?;
            return Ok(SignalEnvelope::Heartbeat(broadcast));
        }

        if !object.contains_key("additions") && !object.contains_key("removals") {
            return Err(CoreError::MalformedSignal(
                "neither a peer broadcast nor a link diff".into(),
            ));
        }

        let diff = PerspectiveDiff::deserialize(payload)
            .map_err(|e| CoreError::MalformedSignal(format!("link diff: {}", e)))?;
        Ok(SignalEnvelope::Echo(diff))
    }
}
