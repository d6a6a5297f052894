//! Broadcast bus for cache change notifications.
//!
//! Built on `tokio::sync::broadcast`. Subscribers get a plain receiver --
//! no UI-framework coupling; consumers bridge to whatever reactive layer
//! they use. Publishing with no active subscribers is a no-op.

use tokio::sync::broadcast;

/// A change in the query cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Startup hydration finished; `restored` entries were seeded.
    Hydrated { restored: usize },
    /// A query result was written or refreshed.
    Updated { key: String },
    /// A query result was removed.
    Removed { key: String },
    /// A batched flush wrote `written` entries to durable storage.
    Flushed { written: usize },
}

/// Multi-consumer event bus for cache changes.
///
/// Cloning the bus clones the sender, allowing multiple producers and
/// consumers.
pub struct CacheEventBus {
    sender: broadcast::Sender<CacheEvent>,
}

impl CacheEventBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: CacheEvent) {
        let _ = self.sender.send(event);
    }
}

impl Clone for CacheEventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for CacheEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
