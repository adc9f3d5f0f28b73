//! # pdiff core
//!
//! Pure primitives for perspective-diff sync: revision fingerprints, agent
//! identities, link diffs and the inbound signal envelope.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`RevisionFingerprint`] - Opaque 32-byte identity of a revision, compared by equality only
//! - [`AgentId`] - Stable identifier of a peer (a DID string)
//! - [`PerspectiveDiff`] - Additions and removals of [`LinkExpression`]s
//! - [`SignalEnvelope`] - A classified inbound signal: peer heartbeat or local echo
//! - [`SyncState`] - What the sync-state observer is told
//!
//! ## Normalization
//!
//! The backing store distinguishes "no value" from "empty value" only through
//! an explicit null. [`PerspectiveDiff::normalized`] folds empty strings into
//! `None` for every link field before a diff is committed.

pub mod error;
pub mod fingerprint;
pub mod link;
pub mod signal;
pub mod types;

pub use error::{CoreError, Result};
pub use fingerprint::RevisionFingerprint;
pub use link::{ExpressionProof, Link, LinkExpression, Perspective, PerspectiveDiff};
pub use signal::{DiffReference, PeerBroadcast, SignalEnvelope};
pub use types::{AgentId, SyncState};
