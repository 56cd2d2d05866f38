//! Event bus for fanning document-change events out to connected sessions.

use super::types::{BoardEvent, Broadcast};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Default broadcast channel capacity
const DEFAULT_CAPACITY: usize = 1024;

/// Distributes [`Broadcast`] envelopes via `tokio::sync::broadcast`.
///
/// Fire-and-forget: emitting never blocks, never panics. With no sessions
/// connected, events are silently dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Broadcast>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to receive events (one receiver per session task).
    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Emit an event with no originating session (background jobs).
    pub fn emit(&self, event: BoardEvent) {
        self.send(Broadcast::new(event));
    }

    /// Emit an event attributed to a session, so element-update relays can
    /// exclude the originator.
    pub fn emit_from(&self, origin: Uuid, event: BoardEvent) {
        self.send(Broadcast::from_session(origin, event));
    }

    fn send(&self, envelope: Broadcast) {
        match self.sender.send(envelope) {
            Ok(n) => debug!(subscribers = n, "board event emitted"),
            Err(_) => {
                // No subscribers — expected and fine
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
