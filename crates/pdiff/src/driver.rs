//! Background scheduling for a sync engine.
//!
//! A [`GossipDriver`] runs two tasks per engine: one ticks the gossip cycle
//! on a fixed interval, the other pumps the backing store's signal channel
//! into the engine. They are separate so that ingestion keeps flowing while
//! a gossip cycle holds the mutation gate.

use std::sync::Arc;
use std::time::Duration;

use pdiff_store::Backend;
use pdiff_sync::SyncEngine;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to the background gossip and signal tasks.
pub struct GossipDriver {
    shutdown: watch::Sender<bool>,
    ticker: JoinHandle<()>,
    pump: JoinHandle<()>,
}

impl GossipDriver {
    /// Start gossiping every `interval` and ingesting from `signals`.
    pub fn spawn<B>(
        engine: Arc<SyncEngine<B>>,
        interval: Duration,
        signals: mpsc::Receiver<Value>,
    ) -> Self
    where
        B: Backend + 'static,
    {
        let (shutdown, _) = watch::channel(false);

        let ticker = tokio::spawn(run_ticker(
            Arc::clone(&engine),
            interval,
            shutdown.subscribe(),
        ));
        let pump = tokio::spawn(run_pump(engine, signals, shutdown.subscribe()));

        Self {
            shutdown,
            ticker,
            pump,
        }
    }

    /// Whether both tasks have exited.
    pub fn is_finished(&self) -> bool {
        self.ticker.is_finished() && self.pump.is_finished()
    }

    /// Stop both tasks and wait for them to exit.
    ///
    /// A gossip cycle already in progress runs to completion first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.ticker.await {
            tracing::warn!("gossip task ended abnormally: {}", e);
        }
        if let Err(e) = self.pump.await {
            tracing::warn!("signal task ended abnormally: {}", e);
        }
    }
}

async fn run_ticker<B: Backend>(
    engine: Arc<SyncEngine<B>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticks = tokio::time::interval(interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so the first cycle runs one
    // interval after start.
    ticks.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticks.tick() => {
                match engine.gossip().await {
                    Ok(report) => tracing::debug!(
                        "gossip cycle {} done: {} pulls, {} failed",
                        report.cycle,
                        report.pulls_issued,
                        report.pulls_failed
                    ),
                    Err(e) => tracing::warn!("gossip cycle skipped: {}", e),
                }
            }
        }
    }

    tracing::debug!("gossip task for {} stopped", engine.agent());
}

async fn run_pump<B: Backend>(
    engine: Arc<SyncEngine<B>>,
    mut signals: mpsc::Receiver<Value>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            signal = signals.recv() => match signal {
                Some(payload) => {
                    engine.ingest_signal(&payload).await;
                }
                None => break,
            },
        }
    }

    tracing::debug!("signal task for {} stopped", engine.agent());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdiff_core::{AgentId, RevisionFingerprint};
    use pdiff_sync::SyncConfig;
    use pdiff_testkit::{fixtures, ScriptedBackend};

    #[tokio::test(start_paused = true)]
    async fn test_driver_gossips_on_interval() {
        let engine = Arc::new(SyncEngine::new(
            AgentId::from("did:me"),
            ScriptedBackend::new(),
            SyncConfig::default(),
        ));
        let (tx, rx) = mpsc::channel(8);
        let mut revisions = engine.watch_revision();

        let driver = GossipDriver::spawn(Arc::clone(&engine), Duration::from_secs(3), rx);

        let target: RevisionFingerprint = fixtures::fingerprint(6);
        tx.send(fixtures::heartbeat_payload("did:peer", target))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(10), revisions.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(engine.current_revision(), Some(target));
        assert_eq!(engine.backend().pull_requests(), vec![(target, true)]);

        driver.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_ends_when_signals_close() {
        let engine = Arc::new(SyncEngine::new(
            AgentId::from("did:me"),
            ScriptedBackend::new(),
            SyncConfig::default(),
        ));
        let (tx, rx) = mpsc::channel(1);
        let driver = GossipDriver::spawn(Arc::clone(&engine), Duration::from_secs(3), rx);

        drop(tx);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(driver.pump.is_finished());
        assert!(!driver.ticker.is_finished());

        driver.stop().await;
    }
}
