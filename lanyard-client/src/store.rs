//! Latest known presence plus connectivity, with change notification.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use lanyard_common::PresenceSnapshot;

/// Whether the consumer is looking at live data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Connecting or waiting to reconnect. Any snapshot is the last known one.
    Connecting,
    /// Subscribed and receiving presence.
    Open,
    /// Disconnected on request.
    Closed,
}

/// A read-only view of the store.
#[derive(Debug, Clone)]
pub struct PresenceView {
    /// `None` until the first presence frame arrives.
    pub snapshot: Option<Arc<PresenceSnapshot>>,
    pub connectivity: Connectivity,
}

/// A change pushed into the store.
#[derive(Debug, Clone)]
pub enum StoreUpdate {
    /// A decoded presence frame. Implies the connection is live.
    Snapshot(PresenceSnapshot),
    /// Connectivity changed without new presence data.
    Connectivity(Connectivity),
}

type Listener = Arc<dyn Fn(&PresenceView) + Send + Sync>;
type Listeners = Mutex<Vec<(u64, Listener)>>;

/// Holds the latest presence and notifies subscribers on every change.
///
/// Only the gateway client writes. Listeners run after the new state is in
/// place, so calling [`PresenceStore::read`] from inside one sees the update.
pub struct PresenceStore {
    view: RwLock<PresenceView>,
    listeners: Arc<Listeners>,
    next_listener_id: AtomicU64,
}

impl Default for PresenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceStore {
    pub fn new() -> Self {
        Self {
            view: RwLock::new(PresenceView {
                snapshot: None,
                connectivity: Connectivity::Closed,
            }),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(0),
        }
    }

    /// Current snapshot and connectivity.
    pub fn read(&self) -> PresenceView {
        self.view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply an update and notify subscribers.
    ///
    /// Every snapshot notifies. A connectivity update notifies only when it
    /// changes the current value.
    pub fn write(&self, update: StoreUpdate) {
        let view = {
            let mut view = self.view.write().unwrap_or_else(PoisonError::into_inner);
            match update {
                StoreUpdate::Snapshot(snapshot) => {
                    view.snapshot = Some(Arc::new(snapshot));
                    view.connectivity = Connectivity::Open;
                }
                StoreUpdate::Connectivity(connectivity) => {
                    if view.connectivity == connectivity {
                        return;
                    }
                    view.connectivity = connectivity;
                }
            }
            view.clone()
        };

        self.notify(&view);
    }

    /// Register a listener, invoked after every change.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PresenceView) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn notify(&self, view: &PresenceView) {
        // Snapshot the list so listeners can subscribe or unsubscribe re-entrantly.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(view);
        }
    }
}

/// Handle for a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Stop receiving notifications.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanyard_common::DiscordStatus;
    use std::sync::atomic::AtomicUsize;

    fn counter(store: &PresenceStore) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let subscription = store.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, subscription)
    }

    #[test]
    fn test_read_before_write() {
        let store = PresenceStore::new();
        let view = store.read();
        assert!(view.snapshot.is_none());
        assert_eq!(view.connectivity, Connectivity::Closed);
    }

    #[test]
    fn test_last_write_wins() {
        let store = PresenceStore::new();
        store.write(StoreUpdate::Snapshot(PresenceSnapshot::with_status(DiscordStatus::Online)));
        store.write(StoreUpdate::Snapshot(PresenceSnapshot::with_status(DiscordStatus::Dnd)));

        let view = store.read();
        assert_eq!(view.snapshot.unwrap().discord_status, DiscordStatus::Dnd);
        assert_eq!(view.connectivity, Connectivity::Open);
    }

    #[test]
    fn test_listener_called_once_per_snapshot() {
        let store = PresenceStore::new();
        let (count, _subscription) = counter(&store);

        store.write(StoreUpdate::Snapshot(PresenceSnapshot::with_status(DiscordStatus::Online)));
        store.write(StoreUpdate::Snapshot(PresenceSnapshot::with_status(DiscordStatus::Online)));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_connectivity_notifies_only_on_transition() {
        let store = PresenceStore::new();
        let (count, _subscription) = counter(&store);

        store.write(StoreUpdate::Connectivity(Connectivity::Connecting));
        store.write(StoreUpdate::Connectivity(Connectivity::Connecting));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        store.write(StoreUpdate::Connectivity(Connectivity::Closed));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_connecting_keeps_last_snapshot() {
        let store = PresenceStore::new();
        store.write(StoreUpdate::Snapshot(PresenceSnapshot::with_status(DiscordStatus::Idle)));
        store.write(StoreUpdate::Connectivity(Connectivity::Connecting));

        let view = store.read();
        assert_eq!(view.connectivity, Connectivity::Connecting);
        assert_eq!(view.snapshot.unwrap().discord_status, DiscordStatus::Idle);
    }

    #[test]
    fn test_read_inside_listener_sees_new_value() {
        let store = Arc::new(PresenceStore::new());
        let observed = Arc::new(Mutex::new(Vec::new()));

        let inner_store = Arc::downgrade(&store);
        let sink = observed.clone();
        let _subscription = store.subscribe(move |view| {
            let store = inner_store.upgrade().unwrap();
            let read = store.read();
            sink.lock().unwrap().push((
                view.snapshot.as_ref().map(|s| s.discord_status),
                read.snapshot.as_ref().map(|s| s.discord_status),
            ));
        });

        store.write(StoreUpdate::Snapshot(PresenceSnapshot::with_status(DiscordStatus::Idle)));

        let observed = observed.lock().unwrap();
        assert_eq!(
            *observed,
            vec![(Some(DiscordStatus::Idle), Some(DiscordStatus::Idle))]
        );
    }

    #[test]
    fn test_multiple_subscribers_and_unsubscribe() {
        let store = PresenceStore::new();
        let (first, first_subscription) = counter(&store);
        let (second, _second_subscription) = counter(&store);
        assert_eq!(store.subscriber_count(), 2);

        store.write(StoreUpdate::Snapshot(PresenceSnapshot::with_status(DiscordStatus::Online)));
        first_subscription.unsubscribe();
        assert_eq!(store.subscriber_count(), 1);
        store.write(StoreUpdate::Snapshot(PresenceSnapshot::with_status(DiscordStatus::Offline)));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_inside_listener() {
        let store = PresenceStore::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicUsize::new(0));

        let inner_slot = slot.clone();
        let seen = count.clone();
        let subscription = store.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            inner_slot.lock().unwrap().take();
        });
        *slot.lock().unwrap() = Some(subscription);

        store.write(StoreUpdate::Connectivity(Connectivity::Connecting));
        store.write(StoreUpdate::Connectivity(Connectivity::Open));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscriber_count(), 0);
    }
}
