//! Embedding sources.
//!
//! `Embedder` is the three-stage model contract; `EmbeddingSource` is the
//! closed image/text variant set a listener holds.

pub mod embedder;
pub mod source;

pub use embedder::{DEFAULT_BATCH_SIZE, Embedder};
pub use source::EmbeddingSource;
