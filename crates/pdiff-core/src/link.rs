//! Links, link expressions and perspective diffs.
//!
//! A perspective is a set of links; agents mutate it by committing diffs of
//! added and removed link expressions.

use serde::{Deserialize, Serialize};

/// A single subject-predicate-object link.
///
/// Every field is tri-state on the wire: a value, an explicit `null`, or
/// missing. Missing fields deserialize to `None`, and `None` always
/// serializes as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub predicate: Option<String>,
}

impl Link {
    pub fn new(
        source: impl Into<String>,
        predicate: Option<&str>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            target: Some(target.into()),
            predicate: predicate.map(String::from),
        }
    }

    /// Replace empty-string fields with `None`.
    pub fn normalize(&mut self) {
        for field in [&mut self.source, &mut self.target, &mut self.predicate] {
            if field.as_deref() == Some("") {
                *field = None;
            }
        }
    }
}

/// Signature over a link expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpressionProof {
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub key: String,
}

/// A link together with its author, timestamp and proof.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkExpression {
    pub author: String,
    pub timestamp: String,
    pub data: Link,
    #[serde(default)]
    pub proof: ExpressionProof,
}

impl LinkExpression {
    pub fn new(author: impl Into<String>, timestamp: impl Into<String>, data: Link) -> Self {
        Self {
            author: author.into(),
            timestamp: timestamp.into(),
            data,
            proof: ExpressionProof::default(),
        }
    }
}

/// A batch of link additions and removals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerspectiveDiff {
    #[serde(default)]
    pub additions: Vec<LinkExpression>,
    #[serde(default)]
    pub removals: Vec<LinkExpression>,
}

impl PerspectiveDiff {
    pub fn new(additions: Vec<LinkExpression>, removals: Vec<LinkExpression>) -> Self {
        Self { additions, removals }
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    /// Normalize every addition and removal in place.
    pub fn normalize(&mut self) {
        for expr in self.additions.iter_mut().chain(self.removals.iter_mut()) {
            expr.data.normalize();
        }
    }

    /// Return a normalized copy, leaving `self` untouched.
    pub fn normalized(&self) -> Self {
        let mut diff = self.clone();
        diff.normalize();
        diff
    }

    /// Append another diff's additions and removals to this one.
    pub fn extend(&mut self, other: PerspectiveDiff) {
        self.additions.extend(other.additions);
        self.removals.extend(other.removals);
    }
}

/// A materialized set of links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perspective {
    pub links: Vec<LinkExpression>,
}

impl Perspective {
    pub fn new(links: Vec<LinkExpression>) -> Self {
        Self { links }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn field() -> impl Strategy<Value = Option<String>> {
        prop_oneof![Just(None), Just(Some(String::new())), "[a-z]{1,6}".prop_map(Some)]
    }

    fn link() -> impl Strategy<Value = Link> {
        (field(), field(), field()).prop_map(|(source, target, predicate)| Link {
            source,
            target,
            predicate,
        })
    }

    #[test]
    fn test_normalize_empty_and_missing_fields() {
        let expr: LinkExpression = serde_json::from_value(json!({
            "author": "did:key:alice",
            "timestamp": "2024-01-01T00:00:00Z",
            "data": { "source": "", "predicate": "p" }
        }))
        .unwrap();

        let diff = PerspectiveDiff::new(vec![expr.clone()], vec![expr]).normalized();

        for expr in diff.additions.iter().chain(diff.removals.iter()) {
            let data = serde_json::to_value(&expr.data).unwrap();
            assert_eq!(data, json!({ "source": null, "target": null, "predicate": "p" }));
        }
    }

    #[test]
    fn test_normalize_keeps_values() {
        let mut link = Link::new("ad4m://self", Some("ad4m://has_child"), "literal://x");
        let before = link.clone();
        link.normalize();
        assert_eq!(link, before);
    }

    #[test]
    fn test_diff_defaults_missing_lists() {
        let diff: PerspectiveDiff = serde_json::from_value(json!({ "additions": [] })).unwrap();
        assert!(diff.is_empty());
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(mut link in link()) {
            link.normalize();
            let once = link.clone();
            link.normalize();
            prop_assert_eq!(&link, &once);
            prop_assert!(link.source.as_deref() != Some(""));
            prop_assert!(link.target.as_deref() != Some(""));
            prop_assert!(link.predicate.as_deref() != Some(""));
        }
    }
}
