//! In-memory document source.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use vindex_types::document::{Document, DocumentEvent, DocumentId};
use vindex_types::error::IndexError;

use super::DocumentSource;

/// Documents held in a map, mutated by applying document events.
#[derive(Default)]
pub struct InMemoryDocumentSource {
    documents: RwLock<BTreeMap<DocumentId, Document>>,
}

impl InMemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        Self {
            documents: RwLock::new(documents.into_iter().map(|d| (d.id.clone(), d)).collect()),
        }
    }

    pub async fn insert(&self, document: Document) {
        self.documents
            .write()
            .await
            .insert(document.id.clone(), document);
    }

    pub async fn remove(&self, id: &DocumentId) -> Option<Document> {
        self.documents.write().await.remove(id)
    }

    /// Apply an upsert or removal.
    pub async fn apply(&self, event: &DocumentEvent) {
        match event {
            DocumentEvent::Upserted(doc) => self.insert(doc.clone()).await,
            DocumentEvent::Removed(id) => {
                self.remove(id).await;
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl DocumentSource for InMemoryDocumentSource {
    async fn list(&self) -> Result<Vec<Document>, IndexError> {
        Ok(self.documents.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, IndexError> {
        Ok(self.documents.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vindex_types::document::FieldValue;

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let source = InMemoryDocumentSource::from_documents([
            Document::new("b"),
            Document::new("a"),
            Document::new("c"),
        ]);

        let ids: Vec<String> = source
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id.0)
            .collect();

        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn events_update_the_source() {
        let source = InMemoryDocumentSource::new();
        let doc = Document::new("a").with_field("text", FieldValue::Text("hi".to_string()));

        source.apply(&DocumentEvent::Upserted(doc.clone())).await;
        assert_eq!(source.get(&"a".into()).await.unwrap(), Some(doc));

        source.apply(&DocumentEvent::Removed("a".into())).await;
        assert!(source.get(&"a".into()).await.unwrap().is_none());
        assert!(source.is_empty().await);
    }
}
