//! Observer channels.
//!
//! Sync-state changes and link echoes leave the engine through bounded
//! channels rather than direct callbacks, so observers never run inside
//! the mutation gate. Each kind has one subscriber slot; subscribing again
//! replaces the previous receiver.
//!
//! Delivery never waits: when a subscriber falls a full buffer behind, new
//! events are dropped with a warning until it catches up.

use std::sync::{Mutex, PoisonError};

use pdiff_core::{PerspectiveDiff, SyncState};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Subscriber slots for engine events.
pub struct Observers {
    sync_state: Mutex<Option<mpsc::Sender<SyncState>>>,
    links: Mutex<Option<mpsc::Sender<PerspectiveDiff>>>,
    buffer: usize,
}

impl Observers {
    pub fn new(buffer: usize) -> Self {
        Self {
            sync_state: Mutex::new(None),
            links: Mutex::new(None),
            buffer: buffer.max(1),
        }
    }

    /// Receive every sync-state classification, in the order computed.
    pub fn subscribe_sync_state(&self) -> mpsc::Receiver<SyncState> {
        let (tx, rx) = mpsc::channel(self.buffer);
        *self.sync_state.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Receive every echoed link diff.
    pub fn subscribe_links(&self) -> mpsc::Receiver<PerspectiveDiff> {
        let (tx, rx) = mpsc::channel(self.buffer);
        *self.links.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Deliver a sync state. Returns `false` if it was dropped.
    pub fn notify_sync_state(&self, state: SyncState) -> bool {
        deliver(&self.sync_state, state, "sync state")
    }

    /// Deliver a link diff. Returns `false` if it was dropped.
    pub fn notify_links(&self, diff: PerspectiveDiff) -> bool {
        deliver(&self.links, diff, "link")
    }
}

fn deliver<T>(slot: &Mutex<Option<mpsc::Sender<T>>>, value: T, kind: &str) -> bool {
    let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(sender) = current.as_ref() else {
        return false;
    };

    match sender.try_send(value) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!("{} observer is not keeping up, dropping event", kind);
            false
        }
        Err(TrySendError::Closed(_)) => {
            *current = None;
            false
        }
    }
}

/// Run `callback` for every value received, in order, on its own task.
pub fn spawn_callback<T, F>(mut rx: mpsc::Receiver<T>, mut callback: F) -> JoinHandle<()>
where
    T: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(value) = rx.recv().await {
            callback(value);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_no_subscriber_drops() {
        let observers = Observers::new(4);
        assert!(!observers.notify_sync_state(SyncState::Synced));
        assert!(!observers.notify_links(PerspectiveDiff::default()));
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let observers = Observers::new(4);
        let mut rx = observers.subscribe_sync_state();

        assert!(observers.notify_sync_state(SyncState::InstalledButNotSynced));
        assert!(observers.notify_sync_state(SyncState::Synced));

        assert_eq!(rx.recv().await, Some(SyncState::InstalledButNotSynced));
        assert_eq!(rx.recv().await, Some(SyncState::Synced));
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_and_closed_slot_is_cleared() {
        let observers = Observers::new(4);
        let first = observers.subscribe_links();
        let mut second = observers.subscribe_links();
        drop(first);

        assert!(observers.notify_links(PerspectiveDiff::default()));
        assert!(second.recv().await.is_some());

        drop(second);
        assert!(!observers.notify_links(PerspectiveDiff::default()));
        assert!(observers.links.lock().unwrap().is_none());
    }

    #[test]
    fn test_full_buffer_drops_instead_of_waiting() {
        let observers = Observers::new(1);
        let mut rx = observers.subscribe_sync_state();

        assert!(observers.notify_sync_state(SyncState::InstalledButNotSynced));
        assert!(!observers.notify_sync_state(SyncState::Synced));

        assert_eq!(rx.try_recv().ok(), Some(SyncState::InstalledButNotSynced));
        assert!(rx.try_recv().is_err());
        assert!(observers.notify_sync_state(SyncState::Synced));
    }

    #[tokio::test]
    async fn test_spawned_callback_sees_every_event() {
        let observers = Observers::new(4);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let task = spawn_callback(observers.subscribe_sync_state(), move |state| {
            sink.lock().unwrap().push(state);
        });

        observers.notify_sync_state(SyncState::Synced);
        observers.notify_sync_state(SyncState::InstalledButNotSynced);
        drop(observers);
        task.await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![SyncState::Synced, SyncState::InstalledButNotSynced]
        );
    }
}
