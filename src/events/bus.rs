//! Thread-safe publish/subscribe bus
//!
//! `emit` snapshots the current subscribers under a read lock and calls them
//! outside of it, so a handler may subscribe or unsubscribe (itself included)
//! while being called. Such changes apply from the next `emit` on.
//!
//! There is no buffering: `emit` returns once every handler has returned.

use super::Event;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, Weak};

/// Event handler callback
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    handlers: BTreeMap<u64, Handler>,
}

/// Multi-producer, multi-consumer event bus
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<RwLock<Subscribers>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; the returned guard removes it again
    pub fn subscribe<F>(&self, handler: F) -> Unsubscribe
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut subs = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let id = subs.next_id;
        subs.next_id += 1;
        subs.handlers.insert(id, Arc::new(handler));

        Unsubscribe {
            bus: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Deliver an event to every handler subscribed at call time
    pub fn emit(&self, event: Event) {
        let handlers: Vec<Handler> = {
            let subs = self.inner.read().unwrap_or_else(|e| e.into_inner());
            subs.handlers.values().cloned().collect()
        };

        for handler in handlers {
            handler(&event);
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .handlers
            .len()
    }
}

/// Removes one subscription when `unsubscribe` is called.
///
/// Dropping the guard without calling it keeps the handler registered.
#[derive(Debug, Clone)]
pub struct Unsubscribe {
    bus: Weak<RwLock<Subscribers>>,
    id: u64,
}

impl Unsubscribe {
    /// Remove the handler; calling it more than once is harmless
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.bus.upgrade() {
            let mut subs = inner.write().unwrap_or_else(|e| e.into_inner());
            subs.handlers.remove(&self.id);
        }
    }
}
