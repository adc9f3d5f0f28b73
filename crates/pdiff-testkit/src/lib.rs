//! # pdiff testkit
//!
//! Testing utilities for pdiff.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Scripted backend**: A [`pdiff_store::Backend`] whose responses, delays and failures are queued by the test
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helpers for links, heartbeats and in-memory networks
//!
//! ## Scripted Backend
//!
//! ```rust
//! use pdiff_testkit::{fixtures, ScriptedBackend};
//!
//! let backend = ScriptedBackend::new();
//! backend.fail_commits(2, "conductor busy");
//! backend.push_commit(Ok(Some(fixtures::fingerprint(7))));
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use pdiff_testkit::generators::perspective_diff;
//!
//! proptest! {
//!     #[test]
//!     fn normalizing_twice_is_a_no_op(diff in perspective_diff(4)) {
//!         prop_assert_eq!(diff.normalized(), diff.normalized().normalized());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod scripted;

pub use fixtures::NetworkFixture;
pub use scripted::{Call, Op, ScriptedBackend};
