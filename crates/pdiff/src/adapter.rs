//! The link adapter: the full link-sync surface for one agent.
//!
//! Wraps a [`SyncEngine`] together with the backing-store calls that do not
//! go through the mutation gate (listing agents, rendering, presence).

use std::sync::Arc;
use std::time::Duration;

use pdiff_core::{AgentId, Perspective, PerspectiveDiff, RevisionFingerprint, SyncState};
use pdiff_store::Backend;
use pdiff_sync::{CommitOutcome, GossipReport, IngestOutcome, SyncConfig, SyncEngine};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::driver::GossipDriver;
use crate::error::Result;

/// Configuration for a [`LinkAdapter`].
#[derive(Debug, Clone)]
pub struct LinkAdapterConfig {
    /// Engine configuration.
    pub sync: SyncConfig,
    /// How often the driver runs a gossip cycle.
    pub gossip_interval: Duration,
    /// Whether local users may commit links.
    pub writable: bool,
    /// Whether the perspective is publicly readable.
    pub public: bool,
}

impl Default for LinkAdapterConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            gossip_interval: Duration::from_secs(3),
            writable: true,
            public: false,
        }
    }
}

/// Link synchronization for one agent over a backing store.
pub struct LinkAdapter<B: Backend> {
    engine: Arc<SyncEngine<B>>,
    backend: Arc<B>,
    config: LinkAdapterConfig,
}

impl<B: Backend + 'static> LinkAdapter<B> {
    /// Create an adapter for `agent`.
    pub fn new(agent: AgentId, backend: B, config: LinkAdapterConfig) -> Self {
        let backend = Arc::new(backend);
        let engine = Arc::new(SyncEngine::with_backend(
            agent,
            Arc::clone(&backend),
            config.sync.clone(),
        ));
        Self {
            engine,
            backend,
            config,
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine<B>> {
        &self.engine
    }

    pub fn agent(&self) -> &AgentId {
        self.engine.agent()
    }

    pub fn config(&self) -> &LinkAdapterConfig {
        &self.config
    }

    pub fn writable(&self) -> bool {
        self.config.writable
    }

    pub fn public(&self) -> bool {
        self.config.public
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Store Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Other agents the backing store knows about.
    pub async fn others(&self) -> Result<Vec<AgentId>> {
        Ok(self.backend.get_others().await?)
    }

    /// The revision the backing store holds for this agent.
    ///
    /// This asks the store; [`SyncEngine::current_revision`] is the engine's
    /// own last known value.
    pub async fn current_revision(&self) -> Result<Option<RevisionFingerprint>> {
        Ok(self.backend.current_revision().await?)
    }

    /// The materialized link set at the current revision.
    pub async fn render(&self) -> Result<Perspective> {
        Ok(self.backend.render().await?)
    }

    /// Announce this agent as an active participant.
    pub async fn add_active_agent_link(&self) -> Result<()> {
        self.backend.add_active_agent_link().await?;
        tracing::debug!("{} registered as active", self.agent());
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Pull the authoritative state and run one gossip cycle.
    pub async fn sync(&self) -> Result<PerspectiveDiff> {
        Ok(self.engine.sync().await?)
    }

    /// Commit a diff.
    ///
    /// Returns the new revision, or `None` if the store produced none or
    /// every attempt failed.
    pub async fn commit(&self, diff: &PerspectiveDiff) -> Result<Option<RevisionFingerprint>> {
        match self.engine.commit(diff).await? {
            CommitOutcome::Committed { revision, .. } => Ok(revision),
            CommitOutcome::Exhausted { .. } => Ok(None),
        }
    }

    /// Run one gossip cycle.
    pub async fn gossip(&self) -> Result<GossipReport> {
        Ok(self.engine.gossip().await?)
    }

    /// Hand a raw signal payload to the engine.
    pub async fn handle_signal(&self, payload: &Value) -> IngestOutcome {
        self.engine.ingest_signal(payload).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observers
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_sync_state_change_callback<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnMut(SyncState) + Send + 'static,
    {
        self.engine.add_sync_state_callback(callback)
    }

    pub fn add_callback<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnMut(PerspectiveDiff) + Send + 'static,
    {
        self.engine.add_link_callback(callback)
    }

    /// Start gossiping on the configured interval and pumping `signals`.
    pub fn spawn_driver(&self, signals: mpsc::Receiver<Value>) -> GossipDriver {
        GossipDriver::spawn(
            Arc::clone(&self.engine),
            self.config.gossip_interval,
            signals,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdiff_store::BackendError;
    use pdiff_testkit::{fixtures, ScriptedBackend};

    fn adapter(backend: ScriptedBackend) -> LinkAdapter<ScriptedBackend> {
        LinkAdapter::new(
            AgentId::from("did:me"),
            backend,
            LinkAdapterConfig::default(),
        )
    }

    #[test]
    fn test_default_flags() {
        let adapter = adapter(ScriptedBackend::new());
        assert!(adapter.writable());
        assert!(!adapter.public());
        assert_eq!(adapter.config().gossip_interval, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_store_queries_pass_through() {
        let backend = ScriptedBackend::new();
        backend.set_others(vec![AgentId::from("did:a")]);
        backend.set_current(Some(fixtures::fingerprint(2)));
        let adapter = adapter(backend);

        assert_eq!(adapter.others().await.unwrap(), vec![AgentId::from("did:a")]);
        assert_eq!(
            adapter.current_revision().await.unwrap(),
            Some(fixtures::fingerprint(2))
        );

        adapter.add_active_agent_link().await.unwrap();
        assert!(adapter.engine().backend().is_active());
    }

    #[tokio::test]
    async fn test_render_reflects_commits() {
        let adapter = adapter(ScriptedBackend::new());
        let diff = fixtures::diff_adding("did:me", &[("ad4m://self", "literal://a")]);

        adapter.commit(&diff).await.unwrap();
        let perspective = adapter.render().await.unwrap();

        assert_eq!(perspective.links, diff.additions);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_commit_returns_none() {
        let backend = ScriptedBackend::new();
        backend.fail_commits(5, "busy");
        let adapter = adapter(backend);

        assert_eq!(adapter.commit(&PerspectiveDiff::default()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sync_propagates_nothing_on_store_failure() {
        let backend = ScriptedBackend::new();
        backend.push_sync(Err(BackendError::Unavailable("offline".into())));
        let adapter = adapter(backend);

        let diff = adapter.sync().await.unwrap();
        assert!(diff.is_empty());
        assert_eq!(adapter.engine().current_revision(), None);
    }
}
