//! Gossip cycle reports and the periodic diagnostic summary.

use std::fmt;
use std::time::Duration;

use pdiff_core::{AgentId, RevisionFingerprint};

use crate::convergence::ConvergenceReport;

/// What one gossip cycle did.
#[derive(Debug, Clone, Default)]
pub struct GossipReport {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    pub is_scribe: bool,
    /// Peers pruned as stale at the start of the cycle.
    pub lost_peers: Vec<AgentId>,
    /// Every classification computed, in order.
    pub classifications: Vec<ConvergenceReport>,
    /// Catch-up pulls issued.
    pub pulls_issued: usize,
    /// Catch-up pulls that failed or timed out.
    pub pulls_failed: usize,
    /// Present on cycles that emit the diagnostic summary.
    pub diagnostics: Option<Diagnostics>,
}

/// A snapshot of the engine's view of the network, for humans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub agent: AgentId,
    pub is_scribe: bool,
    /// Other agents according to the backing store.
    pub others: Vec<AgentId>,
    /// Tracked peers with their revision and time since last heard from.
    pub peers: Vec<PeerLine>,
    /// Distinct peer revisions this cycle.
    pub revisions: Vec<RevisionFingerprint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerLine {
    pub agent: AgentId,
    pub revision: Option<RevisionFingerprint>,
    pub since_seen: Duration,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "======")?;
        writeln!(f, "GOSSIP")?;
        writeln!(f, "--")?;
        writeln!(f, "me: {}", self.agent)?;
        writeln!(f, "is scribe: {}", self.is_scribe)?;
        writeln!(f, "--")?;
        let others: Vec<&str> = self.others.iter().map(AgentId::as_str).collect();
        writeln!(f, "others: {}", others.join(", "))?;
        writeln!(f, "--")?;
        for line in &self.peers {
            match line.revision {
                Some(revision) => writeln!(
                    f,
                    "{}: {} {}ms ago",
                    line.agent,
                    revision,
                    line.since_seen.as_millis()
                )?,
                None => writeln!(f, "{}: none {}ms ago", line.agent, line.since_seen.as_millis())?,
            }
        }
        writeln!(f, "--")?;
        let revisions: Vec<String> = self.revisions.iter().map(|r| r.to_string()).collect();
        write!(f, "revisions: {}", revisions.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_display() {
        let fp = RevisionFingerprint::from_bytes([0xab; 32]);
        let diagnostics = Diagnostics {
            agent: AgentId::from("did:me"),
            is_scribe: true,
            others: vec![AgentId::from("did:x"), AgentId::from("did:y")],
            peers: vec![PeerLine {
                agent: AgentId::from("did:x"),
                revision: Some(fp),
                since_seen: Duration::from_millis(1500),
            }],
            revisions: vec![fp],
        };

        let text = diagnostics.to_string();
        assert!(text.contains("me: did:me"));
        assert!(text.contains("is scribe: true"));
        assert!(text.contains("others: did:x, did:y"));
        assert!(text.contains("did:x: abababababababab 1500ms ago"));
        assert!(text.ends_with("revisions: abababababababab"));
    }
}
