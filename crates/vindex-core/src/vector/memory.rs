//! In-memory vector store with exact (brute-force) nearest-neighbor search.
//!
//! Entries live in a `BTreeMap` behind a `tokio::sync::RwLock`. Queries share
//! the read lock and can run concurrently; upserts and removals take the
//! write lock, so a query never ranks against a half-applied mutation.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use vindex_types::config::EmptyStorePolicy;
use vindex_types::document::DocumentId;
use vindex_types::embedding::{DistanceMetric, SearchHit};
use vindex_types::error::IndexError;

use super::distance::distance;
use super::ranking::top_k;
use super::store::VectorStore;

/// Exact in-memory vector store.
pub struct InMemoryVectorStore {
    dimension: usize,
    metric: DistanceMetric,
    empty_policy: EmptyStorePolicy,
    entries: RwLock<BTreeMap<DocumentId, Vec<f32>>>,
}

impl InMemoryVectorStore {
    /// Create an empty store for vectors of `dimension` compared with `metric`.
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            empty_policy: EmptyStorePolicy::default(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Choose what a query against an empty store returns.
    pub fn with_empty_policy(mut self, policy: EmptyStorePolicy) -> Self {
        self.empty_policy = policy;
        self
    }

    /// Build a store from existing entries (e.g. a snapshot).
    ///
    /// Fails with `DimensionMismatch` on the first entry of the wrong length.
    pub fn from_entries(
        dimension: usize,
        metric: DistanceMetric,
        entries: impl IntoIterator<Item = (DocumentId, Vec<f32>)>,
    ) -> Result<Self, IndexError> {
        let mut map = BTreeMap::new();
        for (id, vector) in entries {
            check_len(dimension, &vector)?;
            map.insert(id, vector);
        }
        Ok(Self {
            dimension,
            metric,
            empty_policy: EmptyStorePolicy::default(),
            entries: RwLock::new(map),
        })
    }

    pub fn empty_policy(&self) -> EmptyStorePolicy {
        self.empty_policy
    }
}

fn check_len(dimension: usize, vector: &[f32]) -> Result<(), IndexError> {
    if vector.len() != dimension {
        return Err(IndexError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }
    Ok(())
}

impl VectorStore for InMemoryVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn upsert(&self, id: &DocumentId, vector: &[f32]) -> Result<(), IndexError> {
        check_len(self.dimension, vector)?;
        self.entries
            .write()
            .await
            .insert(id.clone(), vector.to_vec());
        Ok(())
    }

    async fn upsert_batch(
        &self,
        entries: Vec<(DocumentId, Vec<f32>)>,
    ) -> Vec<(DocumentId, Result<(), IndexError>)> {
        let mut map = self.entries.write().await;
        entries
            .into_iter()
            .map(|(id, vector)| {
                let result = check_len(self.dimension, &vector).map(|()| {
                    map.insert(id.clone(), vector);
                });
                (id, result)
            })
            .collect()
    }

    async fn remove(&self, id: &DocumentId) -> Result<bool, IndexError> {
        Ok(self.entries.write().await.remove(id).is_some())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidK(k));
        }
        check_len(self.dimension, vector)?;

        let map = self.entries.read().await;
        if map.is_empty() {
            return match self.empty_policy {
                EmptyStorePolicy::Error => Err(IndexError::EmptyStore),
                EmptyStorePolicy::EmptyResult => Ok(Vec::new()),
            };
        }

        let metric = self.metric;
        Ok(top_k(
            map.iter()
                .map(|(id, stored)| (id, distance(metric, vector, stored))),
            k,
        ))
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn contains(&self, id: &DocumentId) -> bool {
        self.entries.read().await.contains_key(id)
    }

    async fn entries(&self) -> Vec<(DocumentId, Vec<f32>)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.document_id.as_str()).collect()
    }

    #[tokio::test]
    async fn inserted_vector_is_its_own_nearest_neighbor() {
        let store = InMemoryVectorStore::new(3, DistanceMetric::Cosine);
        store.upsert(&"a".into(), &[1.0, 2.0, 3.0]).await.unwrap();
        store.upsert(&"b".into(), &[-3.0, 0.5, 0.0]).await.unwrap();
        store.upsert(&"c".into(), &[0.0, 1.0, -1.0]).await.unwrap();

        let hits = store.query(&[-3.0, 0.5, 0.0], 1).await.unwrap();

        assert_eq!(ids(&hits), vec!["b"]);
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn cosine_scenario_picks_closest_direction() {
        let store = InMemoryVectorStore::new(4, DistanceMetric::Cosine);
        store.upsert(&"A".into(), &[1.0, 0.0, 0.0, 0.0]).await.unwrap();
        store.upsert(&"B".into(), &[0.0, 1.0, 0.0, 0.0]).await.unwrap();

        let hits = store.query(&[0.9, 0.1, 0.0, 0.0], 1).await.unwrap();

        assert_eq!(ids(&hits), vec!["A"]);
    }

    #[tokio::test]
    async fn l2_orders_by_euclidean_distance() {
        let store = InMemoryVectorStore::new(2, DistanceMetric::L2);
        store.upsert(&"far".into(), &[10.0, 10.0]).await.unwrap();
        store.upsert(&"near".into(), &[1.0, 1.0]).await.unwrap();
        store.upsert(&"mid".into(), &[3.0, 3.0]).await.unwrap();

        let hits = store.query(&[0.0, 0.0], 3).await.unwrap();

        assert_eq!(ids(&hits), vec!["near", "mid", "far"]);
        assert!((hits[0].distance - 2.0_f32.sqrt()).abs() < 1e-6);
    }

    #[tokio::test]
    async fn removed_id_never_returned() {
        let store = InMemoryVectorStore::new(2, DistanceMetric::Cosine);
        store.upsert(&"keep".into(), &[0.0, 1.0]).await.unwrap();
        store.upsert(&"gone".into(), &[1.0, 0.0]).await.unwrap();

        assert!(store.remove(&"gone".into()).await.unwrap());
        let hits = store.query(&[1.0, 0.0], 10).await.unwrap();

        assert_eq!(ids(&hits), vec!["keep"]);
    }

    #[tokio::test]
    async fn removing_absent_id_is_noop() {
        let store = InMemoryVectorStore::new(2, DistanceMetric::Cosine);
        assert!(!store.remove(&"nope".into()).await.unwrap());
    }

    #[tokio::test]
    async fn k_larger_than_store_returns_all_in_order() {
        let store = InMemoryVectorStore::new(2, DistanceMetric::L2);
        store.upsert(&"x".into(), &[2.0, 0.0]).await.unwrap();
        store.upsert(&"y".into(), &[1.0, 0.0]).await.unwrap();

        let hits = store.query(&[0.0, 0.0], 50).await.unwrap();

        assert_eq!(ids(&hits), vec!["y", "x"]);
    }

    #[tokio::test]
    async fn equal_distances_break_ties_by_id() {
        let store = InMemoryVectorStore::new(2, DistanceMetric::L2);
        store.upsert(&"zeta".into(), &[1.0, 0.0]).await.unwrap();
        store.upsert(&"alpha".into(), &[0.0, 1.0]).await.unwrap();
        store.upsert(&"mu".into(), &[-1.0, 0.0]).await.unwrap();

        let hits = store.query(&[0.0, 0.0], 2).await.unwrap();

        assert_eq!(ids(&hits), vec!["alpha", "mu"]);
    }

    #[tokio::test]
    async fn wrong_dimension_upsert_leaves_store_unchanged() {
        let store = InMemoryVectorStore::new(2, DistanceMetric::Cosine);
        store.upsert(&"a".into(), &[1.0, 0.0]).await.unwrap();

        let err = store.upsert(&"a".into(), &[1.0, 0.0, 0.0]).await.unwrap_err();

        assert_eq!(
            err,
            IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
        assert_eq!(store.entries().await, vec![("a".into(), vec![1.0, 0.0])]);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_vector() {
        let store = InMemoryVectorStore::new(2, DistanceMetric::L2);
        store.upsert(&"a".into(), &[1.0, 0.0]).await.unwrap();
        store.upsert(&"a".into(), &[0.0, 1.0]).await.unwrap();

        assert_eq!(store.len().await, 1);
        let hits = store.query(&[0.0, 1.0], 1).await.unwrap();
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn upsert_batch_reports_per_entry() {
        let store = InMemoryVectorStore::new(2, DistanceMetric::Cosine);

        let results = store
            .upsert_batch(vec![
                ("ok".into(), vec![1.0, 0.0]),
                ("bad".into(), vec![1.0]),
                ("ok2".into(), vec![0.0, 1.0]),
            ])
            .await;

        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert!(results[2].1.is_ok());
        assert_eq!(store.len().await, 2);
        assert!(!store.contains(&"bad".into()).await);
    }

    #[tokio::test]
    async fn query_validation() {
        let store = InMemoryVectorStore::new(2, DistanceMetric::Cosine);
        assert_eq!(store.query(&[1.0, 0.0], 1).await.unwrap_err(), IndexError::EmptyStore);

        store.upsert(&"a".into(), &[1.0, 0.0]).await.unwrap();
        assert_eq!(store.query(&[1.0, 0.0], 0).await.unwrap_err(), IndexError::InvalidK(0));
        assert!(matches!(
            store.query(&[1.0], 1).await.unwrap_err(),
            IndexError::DimensionMismatch { .. }
        ));
    }

    #[tokio::test]
    async fn empty_result_policy_returns_no_hits() {
        let store = InMemoryVectorStore::new(2, DistanceMetric::Cosine)
            .with_empty_policy(EmptyStorePolicy::EmptyResult);

        assert!(store.query(&[1.0, 0.0], 3).await.unwrap().is_empty());
    }

    #[test]
    fn from_entries_validates_dimension() {
        let ok = InMemoryVectorStore::from_entries(
            2,
            DistanceMetric::L2,
            vec![("a".into(), vec![1.0, 2.0])],
        );
        assert!(ok.is_ok());

        let bad = InMemoryVectorStore::from_entries(
            2,
            DistanceMetric::L2,
            vec![("a".into(), vec![1.0, 2.0, 3.0])],
        );
        assert!(matches!(bad, Err(IndexError::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn concurrent_queries_and_writes_stay_consistent() {
        let store = Arc::new(InMemoryVectorStore::new(2, DistanceMetric::L2));
        store.upsert(&"origin".into(), &[0.0, 0.0]).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = DocumentId::new(format!("doc-{i:02}"));
                store.upsert(&id, &[i as f32 + 1.0, 0.0]).await.unwrap();
                store.query(&[0.0, 0.0], 1).await.unwrap()
            }));
        }

        for handle in handles {
            let hits = handle.await.unwrap();
            assert_eq!(hits[0].document_id.as_str(), "origin");
        }
        assert_eq!(store.len().await, 17);
    }
}
