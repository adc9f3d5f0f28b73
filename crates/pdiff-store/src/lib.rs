//! # pdiff store
//!
//! The seam between the sync engine and the backing store that owns diff
//! persistence, parent chains and link-graph materialization.
//!
//! ## Overview
//!
//! The engine never touches revisions directly. It reaches the store only
//! through the [`Backend`] trait: pull the authoritative state, pull a
//! specific revision, commit a diff, list other agents. Everything behind
//! that trait (merging, rendering, broadcasting heartbeats) is the store's
//! business.
//!
//! ## Key Types
//!
//! - [`Backend`] - The async trait for all remote store operations
//! - [`MemoryNetwork`] - A shared in-memory "DHT" for tests and demos
//! - [`MemoryBackend`] - One agent's handle onto a [`MemoryNetwork`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pdiff_core::{AgentId, PerspectiveDiff};
//! use pdiff_store::{Backend, MemoryNetwork};
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let (alice, _alice_signals) = network.join(AgentId::from("did:key:alice"));
//!
//!     let revision = alice.commit(&PerspectiveDiff::default()).await.unwrap();
//!     println!("alice is at {:?}", revision);
//! }
//! ```

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{BackendError, Result};
pub use memory::{MemoryBackend, MemoryNetwork};
pub use traits::Backend;
