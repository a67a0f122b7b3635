use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::broadcast;

/// Capacity of the async channel; slow receivers observe `Lagged` and re-read.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Where a preference change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeSource {
    /// `write` in this process.
    Local,
    /// Sign-in or sign-out changed which scoped record applies.
    Identity,
    /// Another process sharing the storage changed it.
    External,
}

/// "Preferences changed, re-read them." Carries no value on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreferenceEvent {
    pub source: ChangeSource,
}

type Listener = Arc<dyn Fn(PreferenceEvent) + Send + Sync>;

struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<u64, Listener>>,
}

/// Fans one event out to synchronous callbacks and async receivers.
pub struct ChangeNotifier {
    registry: Arc<ListenerRegistry>,
    events: broadcast::Sender<PreferenceEvent>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ChangeNotifier")
            .field("listener_count", &self.listener_count())
            .field("receiver_count", &self.events.receiver_count())
            .finish()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry: Arc::new(ListenerRegistry {
                next_id: AtomicU64::new(0),
                listeners: Mutex::new(BTreeMap::new()),
            }),
            events,
        }
    }

    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(PreferenceEvent) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(callback));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreferenceEvent> {
        self.events.subscribe()
    }

    pub fn notify(&self, event: PreferenceEvent) {
        // Snapshot first so callbacks may subscribe or unsubscribe re-entrantly.
        let listeners = self
            .registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect::<Vec<_>>();

        for listener in listeners {
            listener(event);
        }

        // No receivers is not an error.
        let _ = self.events.send(event);
    }

    pub fn listener_count(&self) -> usize {
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Keeps a callback registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the callback"]
pub struct Subscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("id", &self.id)
            .finish()
    }
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }
}
