//! Dispatcher: drains document events from the bus and applies them to an
//! index in batches.

use std::sync::Arc;

use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_util::sync::CancellationToken;

use vindex_types::document::DocumentEvent;

use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::vector::VectorStore;

/// Running totals for one dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub batches: usize,
    pub events: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub removed: usize,
    /// Events dropped because the receiver fell behind the bus.
    pub lagged: u64,
}

/// Feeds document events to one index's primary listener.
pub struct ListenerDispatcher<S, I, T> {
    index: Arc<VectorIndex<S, I, T>>,
    batch_size: usize,
}

impl<S, I, T> ListenerDispatcher<S, I, T>
where
    S: VectorStore + 'static,
    I: Embedder + 'static,
    T: Embedder + 'static,
{
    /// `batch_size` caps how many queued events are applied together.
    pub fn new(index: Arc<VectorIndex<S, I, T>>, batch_size: usize) -> Self {
        Self {
            index,
            batch_size: batch_size.max(1),
        }
    }

    /// Run the dispatcher on its own task.
    pub fn spawn(
        self,
        rx: Receiver<DocumentEvent>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<DispatchStats> {
        tokio::spawn(self.run(rx, cancel))
    }

    /// Wait for an event, drain whatever else is already queued (up to the
    /// batch size) and apply the batch. Returns when the bus closes or
    /// `cancel` fires.
    pub async fn run(
        self,
        mut rx: Receiver<DocumentEvent>,
        cancel: CancellationToken,
    ) -> DispatchStats {
        let mut stats = DispatchStats::default();
        tracing::info!(index = %self.index.name(), "dispatcher started");

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => received,
            };

            let mut batch = match received {
                Ok(event) => vec![event],
                Err(RecvError::Lagged(missed)) => {
                    self.lagged(&mut stats, missed);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let mut closed = false;
            while batch.len() < self.batch_size {
                match rx.try_recv() {
                    Ok(event) => batch.push(event),
                    Err(TryRecvError::Lagged(missed)) => self.lagged(&mut stats, missed),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Closed) => {
                        closed = true;
                        break;
                    }
                }
            }

            self.dispatch(batch, &mut stats).await;
            if closed {
                break;
            }
        }

        tracing::info!(
            index = %self.index.name(),
            batches = stats.batches,
            events = stats.events,
            "dispatcher stopped"
        );
        stats
    }

    async fn dispatch(&self, batch: Vec<DocumentEvent>, stats: &mut DispatchStats) {
        stats.batches += 1;
        stats.events += batch.len();

        match self.index.apply(batch).await {
            Ok(report) => {
                stats.succeeded += report.success_count();
                stats.failed += report.failure_count();
                stats.removed += report.removed;
                for failure in &report.failures {
                    tracing::warn!(
                        index = %self.index.name(),
                        document_id = %failure.document_id,
                        kind = %failure.kind,
                        error = %failure.message,
                        "document update failed"
                    );
                }
            }
            Err(err) => {
                tracing::error!(index = %self.index.name(), error = %err, "failed to apply document events");
            }
        }
    }

    fn lagged(&self, stats: &mut DispatchStats, missed: u64) {
        stats.lagged += missed;
        tracing::warn!(
            index = %self.index.name(),
            missed,
            "dispatcher lagged behind document events"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingSource;
    use crate::event::DocumentEventBus;
    use crate::index::IndexSettings;
    use crate::listener::{Listener, ListenerRegistry};
    use crate::testing::{LookupEmbedder, TestIndex};
    use crate::vector::InMemoryVectorStore;
    use vindex_types::document::{Document, FieldValue};
    use vindex_types::embedding::{DistanceMetric, EmbeddingSpace, Modality};

    fn index() -> Arc<TestIndex> {
        let embedder = LookupEmbedder::new(
            "test-text",
            EmbeddingSpace::new("test", 2),
            Modality::Text,
        )
        .with_entry("north", vec![0.0, 1.0])
        .with_entry("east", vec![1.0, 0.0]);

        Arc::new(
            VectorIndex::new(
                "notes",
                Arc::new(InMemoryVectorStore::new(2, DistanceMetric::Cosine)),
                Arc::new(ListenerRegistry::new()),
                Listener::new("notes/text", "text", EmbeddingSource::Text(embedder)),
                IndexSettings::default(),
            )
            .unwrap(),
        )
    }

    fn text_doc(id: &str, text: &str) -> DocumentEvent {
        DocumentEvent::Upserted(
            Document::new(id).with_field("text", FieldValue::Text(text.to_string())),
        )
    }

    #[tokio::test]
    async fn published_events_reach_the_store() {
        let index = index();
        let bus = DocumentEventBus::new(16);
        let handle = ListenerDispatcher::new(Arc::clone(&index), 8)
            .spawn(bus.subscribe(), CancellationToken::new());

        bus.publish(text_doc("n", "north"));
        bus.publish(text_doc("e", "east"));
        bus.publish(text_doc("bad", "unknown words"));
        bus.publish(DocumentEvent::Removed("e".into()));
        drop(bus);

        let stats = handle.await.unwrap();

        assert_eq!(stats.events, 4);
        assert_eq!(stats.failed, 1);
        assert_eq!(index.store().len().await, 1);
        assert!(index.store().contains(&"n".into()).await);
    }

    #[tokio::test]
    async fn queued_events_are_batched() {
        let index = index();
        let bus = DocumentEventBus::new(16);
        let rx = bus.subscribe();

        for i in 0..5 {
            bus.publish(text_doc(&format!("doc-{i}"), "north"));
        }
        drop(bus);

        let stats = ListenerDispatcher::new(Arc::clone(&index), 2)
            .run(rx, CancellationToken::new())
            .await;

        assert_eq!(stats.batches, 3);
        assert_eq!(stats.succeeded, 5);
        assert_eq!(index.store().len().await, 5);
    }

    #[tokio::test]
    async fn cancellation_stops_the_dispatcher() {
        let index = index();
        let bus = DocumentEventBus::new(16);
        let cancel = CancellationToken::new();
        let handle = ListenerDispatcher::new(index, 8).spawn(bus.subscribe(), cancel.clone());

        cancel.cancel();
        let stats = handle.await.unwrap();

        assert_eq!(stats, DispatchStats::default());
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn lagged_events_are_counted() {
        let index = index();
        let bus = DocumentEventBus::new(2);
        let rx = bus.subscribe();

        for i in 0..5 {
            bus.publish(text_doc(&format!("doc-{i}"), "east"));
        }
        drop(bus);

        let stats = ListenerDispatcher::new(Arc::clone(&index), 8)
            .run(rx, CancellationToken::new())
            .await;

        assert_eq!(stats.lagged, 3);
        assert_eq!(stats.succeeded, 2);
    }
}
