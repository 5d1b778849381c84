//! Embedder trait: the three-stage contract every embedding source honours.
//!
//! Implementations (e.g. fastembed CLIP encoders) live in vindex-infra.

use vindex_types::document::FieldValue;
use vindex_types::embedding::{EmbeddingSpace, Modality};
use vindex_types::error::EmbeddingError;

/// Batch size used when an embedder does not state a preference.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Trait for turning a typed field value into a vector.
///
/// Inference is split into `preprocess -> infer -> postprocess` so the
/// listener can run the cheap per-item stages itself and call the model once
/// per batch. Nothing is assumed about the model beyond this contract and the
/// declared output space.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait Embedder: Send + Sync {
    /// Model-ready form of one input (decoded bytes, a normalized string...).
    type Input: Send;
    /// Raw model output for one input, before postprocessing.
    type Output: Send;

    /// The model name (e.g. "Qdrant/clip-ViT-B-32-vision").
    fn model_name(&self) -> &str;

    /// The space the postprocessed vectors live in.
    fn space(&self) -> &EmbeddingSpace;

    fn modality(&self) -> Modality;

    /// Preferred number of inputs per `infer` call.
    fn batch_size(&self) -> usize {
        DEFAULT_BATCH_SIZE
    }

    /// Convert a raw field value into model input.
    ///
    /// Returns `EmbeddingError::UnsupportedInput` for value kinds the model
    /// cannot consume.
    fn preprocess(&self, raw: &FieldValue) -> Result<Self::Input, EmbeddingError>;

    /// Make the model ready for inference, e.g. download and load weights.
    ///
    /// Called before every batch and not covered by the inference timeout,
    /// so it must be cheap once the model is loaded.
    fn warm_up(&self) -> impl std::future::Future<Output = Result<(), EmbeddingError>> + Send {
        async { Ok(()) }
    }

    /// Run the model over a batch. Returns one output per input, in order.
    fn infer(
        &self,
        inputs: Vec<Self::Input>,
    ) -> impl std::future::Future<Output = Result<Vec<Self::Output>, EmbeddingError>> + Send;

    /// Convert one raw model output into a vector of `space().dimension`.
    fn postprocess(&self, output: Self::Output) -> Result<Vec<f32>, EmbeddingError>;
}
