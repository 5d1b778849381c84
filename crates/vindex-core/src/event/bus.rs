//! Broadcast bus for document change events.
//!
//! Built on `tokio::sync::broadcast`, so any number of dispatchers can follow
//! the same document collection. Publishing with no subscribers is a no-op.

use tokio::sync::broadcast;

use vindex_types::document::DocumentEvent;

/// Multi-consumer bus of `DocumentEvent`s.
///
/// Cloning the bus clones the sender, so producers (watchers, API handlers)
/// can each hold one.
pub struct DocumentEventBus {
    sender: broadcast::Sender<DocumentEvent>,
}

impl DocumentEventBus {
    /// Create a bus whose subscribers can fall `capacity` events behind
    /// before they start lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: DocumentEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for DocumentEventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for DocumentEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentEventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
