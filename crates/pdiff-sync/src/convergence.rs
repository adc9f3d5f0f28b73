//! Convergence classification.
//!
//! An agent decides whether it is in sync by comparing its own revision
//! against the distinct revisions its peers have announced. The rule is a
//! majority vote, not a proof: if most visible peers share the same stale
//! revision, a stale agent still reports itself as synced.

use pdiff_core::{RevisionFingerprint, SyncState};

/// Outcome of comparing the local revision against peer revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The local revision wins a strict majority.
    Synced,
    /// The local revision is tied or in the minority.
    InstalledButNotSynced,
    /// No peer has announced any revision yet.
    Unknown,
}

impl Classification {
    /// The state to report to observers; `Unknown` is never reported.
    pub fn sync_state(self) -> Option<SyncState> {
        match self {
            Classification::Synced => Some(SyncState::Synced),
            Classification::InstalledButNotSynced => Some(SyncState::InstalledButNotSynced),
            Classification::Unknown => None,
        }
    }
}

/// Counts behind a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceReport {
    /// Revisions equal to ours, counting ourselves when we have one.
    pub same_count: usize,
    /// Peer revisions different from ours.
    pub different_count: usize,
    pub classification: Classification,
}

impl ConvergenceReport {
    pub fn is_synced(&self) -> bool {
        matches!(self.classification, Classification::Synced)
    }
}

/// Classify `local` against the distinct revisions peers have announced.
///
/// With a local revision, `same_count` is one (ourselves) plus the peer
/// revisions equal to it. Without one, nothing can match and every peer
/// revision counts as different.
pub fn classify(
    local: Option<&RevisionFingerprint>,
    peer_revisions: &[RevisionFingerprint],
) -> ConvergenceReport {
    let (same_count, different_count) = match local {
        Some(mine) => {
            let same = peer_revisions.iter().filter(|r| *r == mine).count();
            (1 + same, peer_revisions.len() - same)
        }
        None => (0, peer_revisions.len()),
    };

    let classification = if peer_revisions.is_empty() {
        Classification::Unknown
    } else if same_count > different_count {
        Classification::Synced
    } else {
        Classification::InstalledButNotSynced
    };

    ConvergenceReport {
        same_count,
        different_count,
        classification,
    }
}
