//! Vector store trait.
//!
//! Defines the interface for storing vectors keyed by document id and
//! answering nearest-neighbor queries.

use vindex_types::document::DocumentId;
use vindex_types::embedding::{DistanceMetric, SearchHit};
use vindex_types::error::IndexError;

/// Trait for vector storage with nearest-neighbor search.
///
/// The store exclusively owns its entries. Every mutation is all-or-nothing
/// per document: a rejected vector leaves the previous entry (if any) intact.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait VectorStore: Send + Sync {
    /// The fixed vector length accepted by this store.
    fn dimension(&self) -> usize;

    /// The distance metric, fixed at creation time.
    fn metric(&self) -> DistanceMetric;

    /// Insert or replace the vector for `id`.
    ///
    /// Fails with `DimensionMismatch` if `vector.len() != dimension()`.
    fn upsert(
        &self,
        id: &DocumentId,
        vector: &[f32],
    ) -> impl std::future::Future<Output = Result<(), IndexError>> + Send;

    /// Apply many upserts under one write lock.
    ///
    /// Returns one `(id, result)` pair per entry, in input order.
    fn upsert_batch(
        &self,
        entries: Vec<(DocumentId, Vec<f32>)>,
    ) -> impl std::future::Future<Output = Vec<(DocumentId, Result<(), IndexError>)>> + Send;

    /// Delete the vector for `id`. Returns whether an entry existed; an absent
    /// id is not an error.
    fn remove(
        &self,
        id: &DocumentId,
    ) -> impl std::future::Future<Output = Result<bool, IndexError>> + Send;

    /// The `k` ids closest to `vector`, ascending by distance, ties broken by id.
    ///
    /// `k` must be at least 1. Returns all entries if fewer than `k` exist.
    fn query(
        &self,
        vector: &[f32],
        k: usize,
    ) -> impl std::future::Future<Output = Result<Vec<SearchHit>, IndexError>> + Send;

    /// Number of stored vectors.
    fn len(&self) -> impl std::future::Future<Output = usize> + Send;

    fn contains(&self, id: &DocumentId) -> impl std::future::Future<Output = bool> + Send;

    /// Copy of every entry, ordered by id. Used for snapshots.
    fn entries(&self) -> impl std::future::Future<Output = Vec<(DocumentId, Vec<f32>)>> + Send;
}
