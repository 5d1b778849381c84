//! Listener registry: the set of listeners an index can resolve by id.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use vindex_types::error::IndexError;
use vindex_types::listener::{ListenerId, ListenerInfo};

use super::binding::Listener;
use crate::embedding::Embedder;

/// Concurrent map of listener id to listener.
///
/// Listeners are shared as `Arc`s so a search can hold one while the
/// registry changes underneath it.
pub struct ListenerRegistry<I, T> {
    listeners: DashMap<ListenerId, Arc<Listener<I, T>>>,
}

impl<I: Embedder, T: Embedder> ListenerRegistry<I, T> {
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
        }
    }

    /// Register a listener. Fails with `ListenerExists` if the id is taken.
    pub fn register(&self, listener: Listener<I, T>) -> Result<Arc<Listener<I, T>>, IndexError> {
        let id = listener.id().clone();
        match self.listeners.entry(id.clone()) {
            Entry::Occupied(_) => Err(IndexError::ListenerExists(id)),
            Entry::Vacant(slot) => {
                let listener = Arc::new(listener);
                slot.insert(Arc::clone(&listener));
                tracing::debug!(listener = %id, "registered listener");
                Ok(listener)
            }
        }
    }

    pub fn get(&self, id: &ListenerId) -> Option<Arc<Listener<I, T>>> {
        self.listeners.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Resolve an id or fail with `UnknownListener`.
    pub fn resolve(&self, id: &ListenerId) -> Result<Arc<Listener<I, T>>, IndexError> {
        self.get(id)
            .ok_or_else(|| IndexError::UnknownListener(id.clone()))
    }

    pub fn remove(&self, id: &ListenerId) -> Option<Arc<Listener<I, T>>> {
        self.listeners.remove(id).map(|(_, listener)| listener)
    }

    pub fn contains(&self, id: &ListenerId) -> bool {
        self.listeners.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<ListenerId> {
        let mut ids: Vec<ListenerId> = self.listeners.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn infos(&self) -> Vec<ListenerInfo> {
        let mut infos: Vec<ListenerInfo> = self.listeners.iter().map(|e| e.value().info()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<I: Embedder, T: Embedder> Default for ListenerRegistry<I, T> {
    fn default() -> Self {
        Self::new()
    }
}
