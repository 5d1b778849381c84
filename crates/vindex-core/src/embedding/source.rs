//! Closed set of embedding source variants.
//!
//! An index mixes embedders of different modalities that share one vector
//! space. Rather than boxing them behind a trait object, the index is generic
//! over one image embedder type and one text embedder type and holds each
//! listener's source as an `EmbeddingSource` variant.

use std::time::Duration;

use vindex_types::document::FieldValue;
use vindex_types::embedding::{EmbeddingSpace, Modality};
use vindex_types::error::{EmbeddingError, IndexError};

use super::embedder::Embedder;

/// An embedding source: an image embedder or a text embedder.
pub enum EmbeddingSource<I, T> {
    Image(I),
    Text(T),
}

impl<I: Embedder, T: Embedder> EmbeddingSource<I, T> {
    pub fn model_name(&self) -> &str {
        match self {
            EmbeddingSource::Image(e) => e.model_name(),
            EmbeddingSource::Text(e) => e.model_name(),
        }
    }

    pub fn space(&self) -> &EmbeddingSpace {
        match self {
            EmbeddingSource::Image(e) => e.space(),
            EmbeddingSource::Text(e) => e.space(),
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            EmbeddingSource::Image(e) => e.modality(),
            EmbeddingSource::Text(e) => e.modality(),
        }
    }

    /// Preferred batch size, never below 1.
    pub fn batch_size(&self) -> usize {
        let size = match self {
            EmbeddingSource::Image(e) => e.batch_size(),
            EmbeddingSource::Text(e) => e.batch_size(),
        };
        size.max(1)
    }

    /// Embed a batch of values with a single inference call.
    ///
    /// Returns one result per value, in order. Preprocess and postprocess
    /// failures affect only their own value; an inference failure (or
    /// timeout) fails every value that reached the model.
    pub async fn embed_batch(
        &self,
        values: &[&FieldValue],
        timeout: Option<Duration>,
    ) -> Vec<Result<Vec<f32>, IndexError>> {
        match self {
            EmbeddingSource::Image(e) => run_stages(e, values, timeout).await,
            EmbeddingSource::Text(e) => run_stages(e, values, timeout).await,
        }
    }

    /// Embed a single value (the query-time path).
    pub async fn embed(
        &self,
        value: &FieldValue,
        timeout: Option<Duration>,
    ) -> Result<Vec<f32>, IndexError> {
        self.embed_batch(&[value], timeout)
            .await
            .into_iter()
            .next()
            .unwrap_or(Err(IndexError::Embedding(EmbeddingError::OutputCount {
                expected: 1,
                actual: 0,
            })))
    }
}

/// Check a vector against the expected dimension.
pub fn check_dimension(vector: Vec<f32>, dimension: usize) -> Result<Vec<f32>, IndexError> {
    if vector.len() != dimension {
        return Err(IndexError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }
    Ok(vector)
}

async fn run_stages<E: Embedder>(
    embedder: &E,
    values: &[&FieldValue],
    timeout: Option<Duration>,
) -> Vec<Result<Vec<f32>, IndexError>> {
    let dimension = embedder.space().dimension;
    let mut results: Vec<Option<Result<Vec<f32>, IndexError>>> = Vec::with_capacity(values.len());
    let mut slots = Vec::new();
    let mut inputs = Vec::new();

    for (slot, value) in values.iter().enumerate() {
        match value {
            // Precomputed vectors bypass the model entirely.
            FieldValue::Vector(v) => results.push(Some(check_dimension(v.clone(), dimension))),
            other => match embedder.preprocess(other) {
                Ok(input) => {
                    slots.push(slot);
                    inputs.push(input);
                    results.push(None);
                }
                Err(e) => results.push(Some(Err(e.into()))),
            },
        }
    }

    if !inputs.is_empty() {
        let expected = inputs.len();
        tracing::debug!(
            model = embedder.model_name(),
            batch = expected,
            "running inference batch"
        );

        let inferred = match (embedder.warm_up().await, timeout) {
            (Err(err), _) => Err(err),
            (Ok(()), Some(limit)) => tokio::time::timeout(limit, embedder.infer(inputs))
                .await
                .unwrap_or_else(|_| Err(EmbeddingError::Timeout(limit.as_millis() as u64))),
            (Ok(()), None) => embedder.infer(inputs).await,
        };

        match inferred {
            Ok(outputs) if outputs.len() == expected => {
                for (slot, output) in slots.into_iter().zip(outputs) {
                    results[slot] = Some(
                        embedder
                            .postprocess(output)
                            .map_err(IndexError::from)
                            .and_then(|v| check_dimension(v, dimension)),
                    );
                }
            }
            Ok(outputs) => {
                let err = EmbeddingError::OutputCount {
                    expected,
                    actual: outputs.len(),
                };
                for slot in slots {
                    results[slot] = Some(Err(err.clone().into()));
                }
            }
            Err(err) => {
                tracing::warn!(
                    model = embedder.model_name(),
                    error = %err,
                    batch = expected,
                    "inference batch failed"
                );
                for slot in slots {
                    results[slot] = Some(Err(err.clone().into()));
                }
            }
        }
    }

    results
        .into_iter()
        .map(|r| {
            r.unwrap_or(Err(IndexError::Embedding(EmbeddingError::Inference(
                "no output produced".to_string(),
            ))))
        })
        .collect()
}
