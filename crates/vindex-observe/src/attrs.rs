//! Span attribute names for index operations.
//!
//! Usable as constant field names in `tracing` macros:
//! `tracing::info_span!("vindex.search", { INDEX_NAME } = %name)`.

/// Name of the index being built or queried.
pub const INDEX_NAME: &str = "vindex.index.name";

/// Listener used to embed a query or documents.
pub const LISTENER_ID: &str = "vindex.listener.id";

/// Number of neighbors requested.
pub const QUERY_K: &str = "vindex.query.k";

/// Kind of query value (`text`, `blob`, `vector`).
pub const QUERY_KIND: &str = "vindex.query.kind";

/// Number of documents handed to a build.
pub const DOCUMENT_COUNT: &str = "vindex.documents.count";

/// Operation name values.
pub const OP_BUILD: &str = "build";
pub const OP_SEARCH: &str = "search";
pub const OP_WATCH: &str = "watch";

/// Attribute carrying one of the `OP_*` values.
pub const OPERATION_NAME: &str = "vindex.operation.name";
