//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use vindex_types::error::{EmbeddingError, IndexError};

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Index, listener or embedding errors.
    Index(IndexError),
    /// Bad request parameters.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<IndexError> for AppError {
    fn from(e: IndexError) -> Self {
        AppError::Index(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(format!("{e:#}"))
    }
}

impl AppError {
    /// Status code and machine-readable error code.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Index(err) => match err {
                IndexError::IndexNotFound(_) => (StatusCode::NOT_FOUND, "INDEX_NOT_FOUND"),
                IndexError::InvalidK(_) => (StatusCode::BAD_REQUEST, "INVALID_K"),
                IndexError::InvalidName(_) => (StatusCode::BAD_REQUEST, "INVALID_INDEX_NAME"),
                IndexError::UnknownListener(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_LISTENER"),
                IndexError::DimensionMismatch { .. } => {
                    (StatusCode::BAD_REQUEST, "DIMENSION_MISMATCH")
                }
                IndexError::IncompatibleSpace { .. } => {
                    (StatusCode::BAD_REQUEST, "INCOMPATIBLE_SPACE")
                }
                IndexError::MissingField { .. } => (StatusCode::BAD_REQUEST, "MISSING_FIELD"),
                IndexError::EmptyStore => (StatusCode::CONFLICT, "EMPTY_INDEX"),
                IndexError::IndexExists(_) | IndexError::ListenerExists(_) => {
                    (StatusCode::CONFLICT, "CONFLICT")
                }
                IndexError::Embedding(EmbeddingError::UnsupportedInput { .. }) => {
                    (StatusCode::BAD_REQUEST, "UNSUPPORTED_INPUT")
                }
                IndexError::Embedding(EmbeddingError::Timeout(_)) => {
                    (StatusCode::GATEWAY_TIMEOUT, "INFERENCE_TIMEOUT")
                }
                IndexError::Embedding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EMBEDDING_ERROR"),
                IndexError::Source(_) | IndexError::Snapshot(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
                }
            },
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Index(err) => err.to_string(),
            AppError::Validation(msg) | AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        if status.is_server_error() {
            tracing::error!(code, error = %self.message(), "request failed");
        }
        let body = ApiResponse::error(code, &self.message(), String::new(), 0);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: IndexError) -> StatusCode {
        AppError::from(err).status().0
    }

    #[test]
    fn index_errors_map_to_status_codes() {
        assert_eq!(status_of(IndexError::IndexNotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(IndexError::InvalidK(0)), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(IndexError::InvalidName("../x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(IndexError::UnknownListener("x/audio".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(IndexError::DimensionMismatch {
                expected: 512,
                actual: 3
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(IndexError::EmptyStore), StatusCode::CONFLICT);
        assert_eq!(
            status_of(IndexError::Embedding(EmbeddingError::Timeout(100))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(IndexError::Snapshot("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn into_response_uses_mapped_status() {
        let response = AppError::Validation("q must not be empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
