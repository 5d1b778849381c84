//! Index listing and inspection.
//!
//! GET /api/v1/indexes        - Saved indexes with size and modality.
//! GET /api/v1/indexes/{name} - Listeners and size of one index.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};

use vindex_types::index::IndexInfo;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::{AppState, IndexSummary};

/// GET /api/v1/indexes - Every index with a snapshot on disk.
pub async fn list_indexes(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<IndexSummary>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let indexes = state.index_summaries().await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(
        ApiResponse::success(indexes, request_id, elapsed).with_link("self", "/api/v1/indexes"),
    ))
}

/// GET /api/v1/indexes/{name} - Load the index if needed and describe it.
pub async fn get_index(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<IndexInfo>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let index = state.open_index(&name).await?;
    let info = index.info().await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(
        ApiResponse::success(info, request_id, elapsed)
            .with_link("self", &format!("/api/v1/indexes/{name}"))
            .with_link("search", &format!("/api/v1/indexes/{name}/search")),
    ))
}
