use thiserror::Error;

use crate::document::DocumentId;
use crate::listener::ListenerId;

/// Errors raised by an embedding source while turning a value into a vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmbeddingError {
    #[error("model '{model}' cannot embed {kind} values")]
    UnsupportedInput { model: String, kind: &'static str },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("inference timed out after {0} ms")]
    Timeout(u64),

    #[error("model returned {actual} outputs for {expected} inputs")]
    OutputCount { expected: usize, actual: usize },
}

/// Errors from vector store, listener and index operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("document '{document_id}' has no field '{key}'")]
    MissingField { document_id: DocumentId, key: String },

    #[error("unknown listener '{0}'")]
    UnknownListener(ListenerId),

    #[error("vector store is empty")]
    EmptyStore,

    #[error("k must be at least 1, got {0}")]
    InvalidK(usize),

    #[error("embedding space mismatch: expected '{expected}', got '{actual}'")]
    IncompatibleSpace { expected: String, actual: String },

    #[error("listener '{0}' is already registered")]
    ListenerExists(ListenerId),

    #[error("index '{0}' already exists")]
    IndexExists(String),

    #[error("index '{0}' not found")]
    IndexNotFound(String),

    #[error("invalid index name '{0}': use 1-128 letters, digits, '-' or '_'")]
    InvalidName(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("document source error: {0}")]
    Source(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = IndexError::DimensionMismatch {
            expected: 4,
            actual: 3,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 4, got 3");
    }

    #[test]
    fn test_missing_field_display() {
        let err = IndexError::MissingField {
            document_id: "doc-2".into(),
            key: "image".to_string(),
        };
        assert_eq!(err.to_string(), "document 'doc-2' has no field 'image'");
    }

    #[test]
    fn test_embedding_error_converts() {
        let err: IndexError = EmbeddingError::Timeout(250).into();
        assert!(matches!(err, IndexError::Embedding(EmbeddingError::Timeout(250))));
        assert_eq!(err.to_string(), "embedding failed: inference timed out after 250 ms");
    }
}
