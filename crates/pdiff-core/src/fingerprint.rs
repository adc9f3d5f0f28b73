//! Revision fingerprints.
//!
//! A fingerprint names "the current state" of an agent's diff history. The
//! sync engine never looks inside one; it only compares them for equality.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CoreError;

/// A 32-byte revision identity.
///
/// Serialized as a lowercase hex string so signal payloads stay readable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevisionFingerprint(pub [u8; 32]);

impl RevisionFingerprint {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the fingerprint of a revision from its parents and its encoded diff.
    ///
    /// Parents are hashed in the order given; callers that want merge
    /// revisions to collide across agents must sort them first.
    pub fn derive(parents: &[RevisionFingerprint], diff_bytes: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"pdiff-revision-v0:");
        hasher.update(&(parents.len() as u32).to_be_bytes());
        for parent in parents {
            hasher.update(&parent.0);
        }
        hasher.update(diff_bytes);
        Self(*hasher.finalize().as_bytes())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidFingerprint(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Debug for RevisionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RevisionFingerprint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for RevisionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for RevisionFingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for RevisionFingerprint {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for RevisionFingerprint {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into().map_err(|_| {
            CoreError::InvalidFingerprint(format!("expected 32 bytes, got {}", slice.len()))
        })?;
        Ok(Self(arr))
    }
}

impl Serialize for RevisionFingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RevisionFingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_hex_roundtrip() {
        let fp = RevisionFingerprint::from_bytes([0x42; 32]);
        let recovered = RevisionFingerprint::from_hex(&fp.to_hex()).unwrap();
        assert_eq!(fp, recovered);
    }

    #[test]
    fn test_fingerprint_rejects_short_input() {
        assert!(RevisionFingerprint::from_hex("abcd").is_err());
        assert!(RevisionFingerprint::from_hex("not hex").is_err());
    }

    #[test]
    fn test_fingerprint_display_is_prefix() {
        let fp = RevisionFingerprint::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", fp), "abababababababab");
        assert!(format!("{:?}", fp).starts_with("RevisionFingerprint("));
    }

    #[test]
    fn test_derive_depends_on_parent_order_and_diff() {
        let a = RevisionFingerprint::from_bytes([1; 32]);
        let b = RevisionFingerprint::from_bytes([2; 32]);

        let ab = RevisionFingerprint::derive(&[a, b], b"diff");
        let ba = RevisionFingerprint::derive(&[b, a], b"diff");
        let ab_other = RevisionFingerprint::derive(&[a, b], b"other");

        assert_ne!(ab, ba);
        assert_ne!(ab, ab_other);
        assert_eq!(ab, RevisionFingerprint::derive(&[a, b], b"diff"));
    }

    #[test]
    fn test_fingerprint_serializes_as_hex_string() {
        let fp = RevisionFingerprint::from_bytes([0x01; 32]);
        let json = serde_json::to_value(fp).unwrap();
        assert_eq!(json, serde_json::Value::String(fp.to_hex()));

        let back: RevisionFingerprint = serde_json::from_value(json).unwrap();
        assert_eq!(back, fp);
    }
}
