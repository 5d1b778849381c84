//! Deterministic in-memory embedders for tests.
//!
//! `LookupEmbedder` maps input keys (text, or blob bytes read as UTF-8) to
//! fixed vectors, so tests can place documents and queries at exact points
//! in a small space.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use vindex_types::document::FieldValue;
use vindex_types::embedding::{EmbeddingSpace, Modality};
use vindex_types::error::EmbeddingError;

use crate::embedding::{DEFAULT_BATCH_SIZE, Embedder, EmbeddingSource};
use crate::index::VectorIndex;
use crate::listener::Listener;
use crate::vector::InMemoryVectorStore;

pub type TestSource = EmbeddingSource<LookupEmbedder, LookupEmbedder>;
pub type TestListener = Listener<LookupEmbedder, LookupEmbedder>;
pub type TestIndex = VectorIndex<InMemoryVectorStore, LookupEmbedder, LookupEmbedder>;

/// Embedder backed by a key -> vector table.
pub struct LookupEmbedder {
    model: String,
    space: EmbeddingSpace,
    modality: Modality,
    batch_size: usize,
    table: HashMap<String, Vec<f32>>,
    fail_inference: bool,
    delay: Option<Duration>,
    load_delay: Option<Duration>,
    infer_calls: AtomicUsize,
}

impl LookupEmbedder {
    pub fn new(model: impl Into<String>, space: EmbeddingSpace, modality: Modality) -> Self {
        Self {
            model: model.into(),
            space,
            modality,
            batch_size: DEFAULT_BATCH_SIZE,
            table: HashMap::new(),
            fail_inference: false,
            delay: None,
            load_delay: None,
            infer_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, vector: Vec<f32>) -> Self {
        self.table.insert(key.into(), vector);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Every `infer` call fails.
    pub fn failing(mut self) -> Self {
        self.fail_inference = true;
        self
    }

    /// Sleep before answering each `infer` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep in `warm_up`, like a model that is still downloading.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// Number of `infer` calls made so far.
    pub fn infer_calls(&self) -> usize {
        self.infer_calls.load(Ordering::SeqCst)
    }
}

impl Embedder for LookupEmbedder {
    type Input = String;
    type Output = Option<Vec<f32>>;

    fn model_name(&self) -> &str {
        &self.model
    }

    fn space(&self) -> &EmbeddingSpace {
        &self.space
    }

    fn modality(&self) -> Modality {
        self.modality
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn preprocess(&self, raw: &FieldValue) -> Result<String, EmbeddingError> {
        match raw {
            FieldValue::Text(text) => Ok(text.clone()),
            FieldValue::Blob(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            other => Err(EmbeddingError::UnsupportedInput {
                model: self.model.clone(),
                kind: other.kind(),
            }),
        }
    }

    async fn warm_up(&self) -> Result<(), EmbeddingError> {
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn infer(&self, inputs: Vec<String>) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
        self.infer_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_inference {
            return Err(EmbeddingError::Inference("model unavailable".to_string()));
        }
        Ok(inputs
            .iter()
            .map(|key| self.table.get(key).cloned())
            .collect())
    }

    fn postprocess(&self, output: Option<Vec<f32>>) -> Result<Vec<f32>, EmbeddingError> {
        output.ok_or_else(|| EmbeddingError::Inference("no vector for input".to_string()))
    }
}
