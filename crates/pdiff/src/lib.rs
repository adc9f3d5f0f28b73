//! # pdiff
//!
//! The unified API for perspective-diff link sync: peers sharing a link
//! graph converge by gossiping revision fingerprints and pulling the
//! revisions they have not seen.
//!
//! ## Overview
//!
//! - **Revisions**: Opaque fingerprints naming a point in the link history
//! - **Heartbeats**: Peer broadcasts announcing their current revision
//! - **Gossip**: A periodic cycle that prunes silent peers, elects a scribe,
//!   classifies convergence and pulls divergent revisions
//! - **Commits**: Serialized, retried writes of link diffs
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pdiff::{LinkAdapter, LinkAdapterConfig};
//! use pdiff::core::AgentId;
//! use pdiff::store::MemoryNetwork;
//!
//! async fn example() -> pdiff::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let agent = AgentId::random();
//!     let (backend, signals) = network.join(agent.clone());
//!
//!     let adapter = LinkAdapter::new(agent, backend, LinkAdapterConfig::default());
//!     adapter.add_sync_state_change_callback(|state| println!("now {:?}", state));
//!     adapter.add_active_agent_link().await?;
//!     adapter.sync().await?;
//!
//!     // Gossip every three seconds in the background.
//!     let driver = adapter.spawn_driver(signals);
//!     // ...
//!     driver.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `pdiff::core` - Core primitives (RevisionFingerprint, PerspectiveDiff, etc.)
//! - `pdiff::store` - Backing-store trait and the in-memory network
//! - `pdiff::sync` - The reconciliation engine

pub mod adapter;
pub mod driver;
pub mod error;

// Re-export component crates
pub use pdiff_core as core;
pub use pdiff_store as store;
pub use pdiff_sync as sync;

pub use adapter::{LinkAdapter, LinkAdapterConfig};
pub use driver::GossipDriver;
pub use error::{AdapterError, Result};
