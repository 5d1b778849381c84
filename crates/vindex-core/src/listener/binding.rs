//! Listener: one embedding source bound to one document field.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use vindex_types::document::{Document, DocumentId, FieldValue};
use vindex_types::embedding::{EmbeddingSpace, Modality};
use vindex_types::error::IndexError;
use vindex_types::index::DocumentOutcome;
use vindex_types::listener::{ListenerId, ListenerInfo, ListenerState};

use crate::embedding::{Embedder, EmbeddingSource};
use crate::vector::VectorStore;

/// Binds an embedding source to a document field.
///
/// An active listener writes vectors for the documents it sees into a vector
/// store. An inactive one never writes; it only supplies its embedding
/// function for query-time vectorization.
pub struct Listener<I, T> {
    id: ListenerId,
    key: String,
    source: EmbeddingSource<I, T>,
    active: AtomicBool,
}

impl<I: Embedder, T: Embedder> Listener<I, T> {
    /// Create an active listener reading `key`.
    pub fn new(id: impl Into<ListenerId>, key: impl Into<String>, source: EmbeddingSource<I, T>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            source,
            active: AtomicBool::new(true),
        }
    }

    /// Create a listener in the given state.
    pub fn with_state(mut self, state: ListenerState) -> Self {
        self.active = AtomicBool::new(state.is_active());
        self
    }

    pub fn id(&self) -> &ListenerId {
        &self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source(&self) -> &EmbeddingSource<I, T> {
        &self.source
    }

    pub fn space(&self) -> &EmbeddingSpace {
        self.source.space()
    }

    pub fn modality(&self) -> Modality {
        self.source.modality()
    }

    pub fn batch_size(&self) -> usize {
        self.source.batch_size()
    }

    pub fn state(&self) -> ListenerState {
        if self.active.load(Ordering::SeqCst) {
            ListenerState::Active
        } else {
            ListenerState::Inactive
        }
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// `Inactive -> Active`. Returns true if the state changed; the caller is
    /// responsible for backfilling existing documents.
    pub fn activate(&self) -> bool {
        !self.active.swap(true, Ordering::SeqCst)
    }

    /// `Active -> Inactive`. Returns true if the state changed. Vectors
    /// already written stay in the store.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    pub fn info(&self) -> ListenerInfo {
        ListenerInfo {
            id: self.id.clone(),
            key: self.key.clone(),
            model: self.source.model_name().to_string(),
            modality: self.modality(),
            space: self.space().clone(),
            state: self.state(),
        }
    }

    /// Embed a value without touching any store (the query path).
    pub async fn embed_value(
        &self,
        value: &FieldValue,
        timeout: Option<Duration>,
    ) -> Result<Vec<f32>, IndexError> {
        self.source.embed(value, timeout).await
    }

    /// Process one document.
    pub async fn on_document<S: VectorStore>(
        &self,
        doc: &Document,
        store: &S,
        timeout: Option<Duration>,
    ) -> DocumentOutcome {
        self.on_documents(std::slice::from_ref(doc), store, timeout)
            .await
            .pop()
            .map(|(_, outcome)| outcome)
            .unwrap_or(DocumentOutcome::Skipped)
    }

    /// Process documents in batches of the source's preferred size, one
    /// inference call per batch, one store write lock per batch.
    ///
    /// Returns one outcome per document, in input order. Documents missing
    /// the bound field are reported as `MissingField` and skipped.
    pub async fn on_documents<S: VectorStore>(
        &self,
        docs: &[Document],
        store: &S,
        timeout: Option<Duration>,
    ) -> Vec<(DocumentId, DocumentOutcome)> {
        if !self.is_active() {
            return docs
                .iter()
                .map(|d| (d.id.clone(), DocumentOutcome::Skipped))
                .collect();
        }

        let mut outcomes = Vec::with_capacity(docs.len());
        for chunk in docs.chunks(self.batch_size().max(1)) {
            let pending = self.embed_documents(chunk, timeout).await;
            outcomes.extend(pending.commit(store).await);
        }
        outcomes
    }

    /// Embed documents without writing them, one inference call per batch of
    /// the source's preferred size.
    ///
    /// Does not check the listener's state; the caller decides whether the
    /// result is committed.
    pub async fn embed_documents(
        &self,
        docs: &[Document],
        timeout: Option<Duration>,
    ) -> PendingWrites {
        let mut pending = PendingWrites {
            outcomes: Vec::with_capacity(docs.len()),
            writes: Vec::new(),
        };

        for chunk in docs.chunks(self.batch_size().max(1)) {
            let offset = pending.outcomes.len();
            let mut values = Vec::new();
            let mut slots = Vec::new();

            for (slot, doc) in chunk.iter().enumerate() {
                match doc.field(&self.key) {
                    Some(value) => {
                        values.push(value);
                        slots.push(offset + slot);
                        pending.outcomes.push((doc.id.clone(), None));
                    }
                    None => {
                        tracing::warn!(
                            listener = %self.id,
                            document_id = %doc.id,
                            key = %self.key,
                            "document missing indexed field; skipping"
                        );
                        let err = IndexError::MissingField {
                            document_id: doc.id.clone(),
                            key: self.key.clone(),
                        };
                        pending
                            .outcomes
                            .push((doc.id.clone(), Some(DocumentOutcome::Failed(err))));
                    }
                }
            }

            if values.is_empty() {
                continue;
            }
            let embedded = self.source.embed_batch(&values, timeout).await;
            for (slot, result) in slots.into_iter().zip(embedded) {
                match result {
                    Ok(vector) => pending.writes.push((slot, vector)),
                    Err(err) => {
                        tracing::warn!(
                            listener = %self.id,
                            document_id = %pending.outcomes[slot].0,
                            error = %err,
                            "failed to embed document"
                        );
                        pending.outcomes[slot].1 = Some(DocumentOutcome::Failed(err));
                    }
                }
            }
        }

        pending
    }
}

/// Vectors produced by a listener that have not been written yet.
///
/// Outcomes stay in input order. Documents whose write is discarded are
/// reported as `Skipped`.
#[derive(Debug)]
pub struct PendingWrites {
    outcomes: Vec<(DocumentId, Option<DocumentOutcome>)>,
    writes: Vec<(usize, Vec<f32>)>,
}

impl PendingWrites {
    /// Number of vectors waiting to be written.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Drop the pending writes of every document in `ids`. Returns how many
    /// were dropped.
    pub fn discard(&mut self, ids: &BTreeSet<DocumentId>) -> usize {
        let before = self.writes.len();
        let outcomes = &self.outcomes;
        self.writes
            .retain(|(slot, _)| !ids.contains(&outcomes[*slot].0));
        before - self.writes.len()
    }

    /// Drop every pending write.
    pub fn discard_all(&mut self) {
        self.writes.clear();
    }

    /// Write the remaining vectors to `store` under one write lock and
    /// return the per-document outcomes.
    pub async fn commit<S: VectorStore>(self, store: &S) -> Vec<(DocumentId, DocumentOutcome)> {
        let Self {
            mut outcomes,
            writes,
        } = self;

        if !writes.is_empty() {
            let (slots, batch): (Vec<usize>, Vec<(DocumentId, Vec<f32>)>) = writes
                .into_iter()
                .map(|(slot, vector)| (slot, (outcomes[slot].0.clone(), vector)))
                .unzip();
            let written = store.upsert_batch(batch).await;
            for (slot, (_, result)) in slots.into_iter().zip(written) {
                outcomes[slot].1 = Some(match result {
                    Ok(()) => DocumentOutcome::Indexed,
                    Err(err) => DocumentOutcome::Failed(err),
                });
            }
        }

        outcomes
            .into_iter()
            .map(|(id, outcome)| (id, outcome.unwrap_or(DocumentOutcome::Skipped)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LookupEmbedder, TestListener};
    use crate::vector::InMemoryVectorStore;
    use vindex_types::embedding::DistanceMetric;

    fn listener(batch_size: usize) -> TestListener {
        let space = EmbeddingSpace::new("test", 2);
        Listener::new(
            "img",
            "image",
            EmbeddingSource::Image(
                LookupEmbedder::new("test-image", space, Modality::Image)
                    .with_entry("p1", vec![1.0, 0.0])
                    .with_entry("p2", vec![0.0, 1.0])
                    .with_entry("p3", vec![1.0, 1.0])
                    .with_batch_size(batch_size),
            ),
        )
    }

    fn image_doc(id: &str, key: &str) -> Document {
        Document::new(id).with_field("image", FieldValue::Blob(key.as_bytes().to_vec()))
    }

    fn infer_calls(listener: &TestListener) -> usize {
        match listener.source() {
            EmbeddingSource::Image(e) | EmbeddingSource::Text(e) => e.infer_calls(),
        }
    }

    #[tokio::test]
    async fn active_listener_writes_vectors() {
        let listener = listener(32);
        let store = InMemoryVectorStore::new(2, DistanceMetric::Cosine);

        let outcome = listener
            .on_document(&image_doc("d1", "p1"), &store, None)
            .await;

        assert_eq!(outcome, DocumentOutcome::Indexed);
        assert!(store.contains(&"d1".into()).await);
    }

    #[tokio::test]
    async fn inactive_listener_never_writes() {
        let listener = listener(32).with_state(ListenerState::Inactive);
        let store = InMemoryVectorStore::new(2, DistanceMetric::Cosine);

        let outcome = listener
            .on_document(&image_doc("d1", "p1"), &store, None)
            .await;

        assert_eq!(outcome, DocumentOutcome::Skipped);
        assert_eq!(store.len().await, 0);
        assert_eq!(infer_calls(&listener), 0);
    }

    #[tokio::test]
    async fn missing_field_is_reported_not_fatal() {
        let listener = listener(32);
        let store = InMemoryVectorStore::new(2, DistanceMetric::Cosine);
        let docs = vec![
            image_doc("d1", "p1"),
            Document::new("d2").with_field("caption", FieldValue::Text("x".to_string())),
            image_doc("d3", "p3"),
        ];

        let outcomes = listener.on_documents(&docs, &store, None).await;

        assert_eq!(outcomes[0].1, DocumentOutcome::Indexed);
        assert!(matches!(
            outcomes[1].1,
            DocumentOutcome::Failed(IndexError::MissingField { .. })
        ));
        assert_eq!(outcomes[2].1, DocumentOutcome::Indexed);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn documents_are_batched_by_preferred_size() {
        let listener = listener(2);
        let store = InMemoryVectorStore::new(2, DistanceMetric::Cosine);
        let docs = vec![
            image_doc("d1", "p1"),
            image_doc("d2", "p2"),
            image_doc("d3", "p3"),
        ];

        let outcomes = listener.on_documents(&docs, &store, None).await;

        assert!(outcomes.iter().all(|(_, o)| *o == DocumentOutcome::Indexed));
        assert_eq!(infer_calls(&listener), 2);
    }

    #[tokio::test]
    async fn wrong_dimension_output_leaves_store_untouched() {
        let space = EmbeddingSpace::new("test", 2);
        let listener: TestListener = Listener::new(
            "img",
            "image",
            EmbeddingSource::Image(
                LookupEmbedder::new("bad-model", space, Modality::Image)
                    .with_entry("p1", vec![1.0, 0.0, 0.0]),
            ),
        );
        let store = InMemoryVectorStore::new(2, DistanceMetric::Cosine);

        let outcome = listener
            .on_document(&image_doc("d1", "p1"), &store, None)
            .await;

        assert!(matches!(
            outcome,
            DocumentOutcome::Failed(IndexError::DimensionMismatch { .. })
        ));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn discarded_writes_are_reported_as_skipped() {
        let listener = listener(32);
        let store = InMemoryVectorStore::new(2, DistanceMetric::Cosine);
        let docs = vec![image_doc("d1", "p1"), image_doc("d2", "p2")];

        let mut pending = listener.embed_documents(&docs, None).await;
        assert_eq!(pending.len(), 2);
        assert_eq!(store.len().await, 0);

        let dropped = pending.discard(&BTreeSet::from([DocumentId::from("d1")]));
        let outcomes = pending.commit(&store).await;

        assert_eq!(dropped, 1);
        assert_eq!(outcomes[0], ("d1".into(), DocumentOutcome::Skipped));
        assert_eq!(outcomes[1], ("d2".into(), DocumentOutcome::Indexed));
        assert!(!store.contains(&"d1".into()).await);
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn state_transitions() {
        let listener = listener(32);
        assert_eq!(listener.state(), ListenerState::Active);

        assert!(listener.deactivate());
        assert!(!listener.deactivate());
        assert_eq!(listener.state(), ListenerState::Inactive);

        assert!(listener.activate());
        assert!(!listener.activate());
        assert_eq!(listener.info().state, ListenerState::Active);
    }
}
