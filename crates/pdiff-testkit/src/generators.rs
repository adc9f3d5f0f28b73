//! Proptest generators for property-based testing.

use proptest::prelude::*;

use pdiff_core::{AgentId, Link, LinkExpression, PerspectiveDiff, RevisionFingerprint};

/// Generate a random RevisionFingerprint.
pub fn fingerprint() -> impl Strategy<Value = RevisionFingerprint> {
    any::<[u8; 32]>().prop_map(RevisionFingerprint::from_bytes)
}

/// Generate a fingerprint from a small pool, so collisions are common.
pub fn pooled_fingerprint(pool: u8) -> impl Strategy<Value = RevisionFingerprint> {
    (0..pool.max(1)).prop_map(|b| RevisionFingerprint::from_bytes([b; 32]))
}

/// Generate a DID-shaped agent id.
pub fn agent_id() -> impl Strategy<Value = AgentId> {
    "did:key:z[a-zA-Z0-9]{1,12}".prop_map(AgentId::new)
}

/// Generate a set of distinct agent ids.
pub fn agent_ids(max: usize) -> impl Strategy<Value = Vec<AgentId>> {
    prop::collection::btree_set(agent_id(), 0..=max).prop_map(|set| set.into_iter().collect())
}

/// Generate a link field: absent, empty, or a short URI.
pub fn link_field() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        "[a-z]{1,6}://[a-z0-9]{1,8}".prop_map(Some),
    ]
}

/// Generate a link, possibly with empty fields.
pub fn link() -> impl Strategy<Value = Link> {
    (link_field(), link_field(), link_field()).prop_map(|(source, predicate, target)| Link {
        source,
        target,
        predicate,
    })
}

/// Generate a link expression.
pub fn link_expression() -> impl Strategy<Value = LinkExpression> {
    (agent_id(), link()).prop_map(|(author, data)| {
        LinkExpression::new(author.as_str(), "2024-01-01T00:00:00.000Z", data)
    })
}

/// Generate a diff with up to `max` additions and removals each.
pub fn perspective_diff(max: usize) -> impl Strategy<Value = PerspectiveDiff> {
    (
        prop::collection::vec(link_expression(), 0..=max),
        prop::collection::vec(link_expression(), 0..=max),
    )
        .prop_map(|(additions, removals)| PerspectiveDiff::new(additions, removals))
}
