//! Index catalog: the named collection of vector indexes and the query
//! surface over them.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use vindex_types::document::FieldValue;
use vindex_types::embedding::SearchHit;
use vindex_types::error::IndexError;
use vindex_types::listener::ListenerId;

use super::vector_index::VectorIndex;
use crate::embedding::Embedder;
use crate::vector::VectorStore;

pub struct IndexCatalog<S, I, T> {
    indexes: DashMap<String, Arc<VectorIndex<S, I, T>>>,
}

impl<S, I, T> IndexCatalog<S, I, T>
where
    S: VectorStore,
    I: Embedder,
    T: Embedder,
{
    pub fn new() -> Self {
        Self {
            indexes: DashMap::new(),
        }
    }

    /// Add an index under its own name. Fails with `IndexExists` on a
    /// duplicate name.
    pub fn create(
        &self,
        index: VectorIndex<S, I, T>,
    ) -> Result<Arc<VectorIndex<S, I, T>>, IndexError> {
        match self.indexes.entry(index.name().to_string()) {
            Entry::Occupied(entry) => Err(IndexError::IndexExists(entry.key().clone())),
            Entry::Vacant(slot) => {
                let index = Arc::new(index);
                slot.insert(Arc::clone(&index));
                tracing::info!(index = %index.name(), "index added to catalog");
                Ok(index)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<VectorIndex<S, I, T>>> {
        self.indexes.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up an index or fail with `IndexNotFound`.
    pub fn resolve(&self, name: &str) -> Result<Arc<VectorIndex<S, I, T>>, IndexError> {
        self.get(name)
            .ok_or_else(|| IndexError::IndexNotFound(name.to_string()))
    }

    /// Drop an index from the catalog. Its listeners stay in the registry
    /// until the caller removes them.
    pub fn remove(&self, name: &str) -> Result<Arc<VectorIndex<S, I, T>>, IndexError> {
        self.indexes
            .remove(name)
            .map(|(_, index)| index)
            .ok_or_else(|| IndexError::IndexNotFound(name.to_string()))
    }

    /// Index names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Search `index_name` for the `k` documents nearest to `value`.
    pub async fn search(
        &self,
        value: &FieldValue,
        index_name: &str,
        using: Option<&ListenerId>,
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let index = self.resolve(index_name)?;
        index.search(value, using, k).await
    }
}

impl<S, I, T> Default for IndexCatalog<S, I, T>
where
    S: VectorStore,
    I: Embedder,
    T: Embedder,
{
    fn default() -> Self {
        Self::new()
    }
}
