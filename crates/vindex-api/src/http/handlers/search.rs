//! Text search over one index.
//!
//! GET /api/v1/indexes/{name}/search?q=...&k=...&using=...

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use vindex_observe::attrs;
use vindex_types::document::FieldValue;
use vindex_types::embedding::SearchHit;
use vindex_types::listener::ListenerId;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Query parameters for search.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Query text.
    pub q: String,
    /// Number of results. Defaults to the configured `default_k`.
    pub k: Option<usize>,
    /// Listener role that embeds the query (`text` unless given).
    #[serde(default = "default_using")]
    pub using: String,
}

fn default_using() -> String {
    "text".to_string()
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub index: String,
    pub using: ListenerId,
    pub k: usize,
    pub hits: Vec<SearchHit>,
}

/// GET /api/v1/indexes/{name}/search - Embed `q` and return the nearest
/// documents.
pub async fn search(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<SearchResult>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let query = params.q.trim();
    if query.is_empty() {
        return Err(AppError::Validation("q must not be empty".to_string()));
    }

    state.open_index(&name).await?;

    // k = 0 is passed through so the index rejects it with InvalidK.
    let k = params.k.unwrap_or(state.config.default_k);
    let using = ListenerId::new(format!("{name}/{}", params.using));
    let value = FieldValue::Text(query.to_string());

    let span = tracing::info_span!(
        "vindex.search",
        { attrs::OPERATION_NAME } = attrs::OP_SEARCH,
        { attrs::INDEX_NAME } = %name,
        { attrs::LISTENER_ID } = %using,
        { attrs::QUERY_K } = k,
        { attrs::QUERY_KIND } = value.kind(),
        request_id = %request_id,
    );
    let hits = state
        .catalog
        .search(&value, &name, Some(&using), k)
        .instrument(span)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let result = SearchResult {
        index: name.clone(),
        using,
        k,
        hits,
    };
    Ok(Json(
        ApiResponse::success(result, request_id, elapsed)
            .with_link("index", &format!("/api/v1/indexes/{name}")),
    ))
}
