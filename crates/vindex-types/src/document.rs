//! Document types.
//!
//! A document is an identifier plus a map of named, typed field values. The
//! index only ever reads the field a listener is bound to; everything else
//! is carried through untouched.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a document in the surrounding document store.
///
/// Ordered lexicographically. The ordering is what breaks distance ties in
/// search results, so it must stay total and stable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    /// Raw bytes, e.g. an encoded image.
    Blob(Vec<u8>),
    /// Free text.
    Text(String),
    /// A vector computed ahead of time.
    Vector(Vec<f32>),
}

impl FieldValue {
    /// Short lowercase name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Blob(_) => "blob",
            FieldValue::Text(_) => "text",
            FieldValue::Vector(_) => "vector",
        }
    }
}

/// A document: identifier plus field values keyed by field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Document {
    /// Create a document with no fields.
    pub fn new(id: impl Into<DocumentId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Look up a field by name.
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

/// Change notification for a document collection.
///
/// Published on the document event bus and consumed by listener dispatchers
/// to keep an index up to date as documents arrive.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    /// A document was created or one of its fields changed.
    Upserted(Document),
    /// A document was deleted from the collection.
    Removed(DocumentId),
}

impl DocumentEvent {
    /// Id of the document this event refers to.
    pub fn document_id(&self) -> &DocumentId {
        match self {
            DocumentEvent::Upserted(doc) => &doc.id,
            DocumentEvent::Removed(id) => id,
        }
    }
}
