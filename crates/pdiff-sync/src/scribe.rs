//! Scribe election.
//!
//! The scribe is the lexicographically first agent among the known peers
//! and ourselves. Every agent that sees the same peer set picks the same
//! scribe, so no election protocol is needed and nothing is stored between
//! cycles.
//!
//! The result is only a hint: it is logged and passed through to catch-up
//! pulls, it never restricts what an agent may do.

use std::collections::BTreeSet;

use pdiff_core::AgentId;

/// The outcome of one election, computed once per gossip cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Election {
    /// Sorted, deduplicated membership; always contains the local agent.
    members: Vec<AgentId>,
    is_scribe: bool,
}

impl Election {
    pub fn new(local: &AgentId, peers: impl IntoIterator<Item = AgentId>) -> Self {
        let mut members: BTreeSet<AgentId> = peers.into_iter().collect();
        members.insert(local.clone());

        let members: Vec<AgentId> = members.into_iter().collect();
        let is_scribe = members.first() == Some(local);

        Self { members, is_scribe }
    }

    /// The elected scribe.
    pub fn scribe(&self) -> &AgentId {
        // Non-empty: the local agent is always a member.
        &self.members[0]
    }

    pub fn is_scribe(&self) -> bool {
        self.is_scribe
    }

    pub fn members(&self) -> &[AgentId] {
        &self.members
    }
}

/// Elect a scribe among `peers` and `local`.
pub fn elect(local: &AgentId, peers: &[AgentId]) -> Election {
    Election::new(local, peers.iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdiff_testkit::generators::{agent_id, agent_ids};
    use proptest::prelude::*;

    #[test]
    fn test_lowest_id_is_scribe() {
        let me = AgentId::from("did:m");
        let election = elect(&me, &[AgentId::from("did:z"), AgentId::from("did:b")]);

        assert_eq!(election.scribe(), &AgentId::from("did:b"));
        assert!(!election.is_scribe());
        assert_eq!(election.members().len(), 3);
    }

    #[test]
    fn test_alone_means_scribe() {
        let me = AgentId::from("did:m");
        let election = elect(&me, &[]);
        assert!(election.is_scribe());
        assert_eq!(election.scribe(), &me);
    }

    #[test]
    fn test_duplicate_of_self_in_peers() {
        let me = AgentId::from("did:a");
        let election = elect(&me, &[me.clone(), AgentId::from("did:b")]);
        assert_eq!(election.members().len(), 2);
        assert!(election.is_scribe());
    }

    proptest! {
        #[test]
        fn election_ignores_input_order(mut peers in agent_ids(8), me in agent_id()) {
            let forward = elect(&me, &peers);
            peers.reverse();
            let backward = elect(&me, &peers);
            prop_assert_eq!(forward, backward);
        }

        #[test]
        fn peers_with_same_view_agree(peers in agent_ids(8), me in agent_id()) {
            let mine = elect(&me, &peers);

            // Any other member, given the same overall set, names the same scribe.
            for other in mine.members() {
                let theirs = elect(other, mine.members());
                prop_assert_eq!(theirs.scribe(), mine.scribe());
                prop_assert_eq!(theirs.is_scribe(), other == mine.scribe());
            }
        }
    }
}
