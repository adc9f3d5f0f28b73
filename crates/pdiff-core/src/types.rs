//! Strong type definitions shared by the sync engine and the backing store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an agent in the sync network.
///
/// Agents are named by DID strings. Ordering is plain lexicographic byte
/// order, which is what scribe election sorts by.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random `did:key` style identifier.
    pub fn random() -> Self {
        use rand::Rng;
        let bytes: [u8; 16] = rand::thread_rng().gen();
        Self(format!("did:key:z{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentId({})", self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Sync state reported to the sync-state observer.
///
/// There is deliberately no "unknown" variant: when no peer has reported a
/// revision, nothing is reported at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    /// The local revision is shared by a strict majority of the visible revisions.
    Synced,
    /// The link language is running but the local revision is in the minority.
    InstalledButNotSynced,
}
