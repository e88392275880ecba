//! Notifications published by the associator.

use tokio::sync::broadcast;

/// Capacity of the event channel. Slow subscribers lag and skip events.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Something observers of the session tree may want to refresh on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A full association finished.
    AssociationCycleComplete,
    /// Session sync was torn down; foreign sessions are gone.
    ForeignSessionDisabled,
    /// Foreign session data changed.
    ForeignSessionUpdated,
    /// A foreign session was deleted.
    ForeignSessionDeleted {
        /// Tag of the deleted session.
        tag: String,
    },
    /// A host asked for fresh session data from the server.
    SyncRefreshRequested,
}

/// Broadcast sender wrapper that tolerates having no subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a bus with [`EVENT_CHANNEL_CAPACITY`].
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// New receiver for events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event.
    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event.clone()).is_err() {
            tracing::trace!("No subscribers for {:?}", event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
