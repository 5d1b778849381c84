//! Listener identifiers, state and descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::embedding::{EmbeddingSpace, Modality};

/// Identifier of a listener in the listener registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(pub String);

impl ListenerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListenerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ListenerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether a listener writes into the vector store.
///
/// Only two states exist. Going `Inactive -> Active` is followed by an
/// explicit backfill; going `Active -> Inactive` stops future writes but keeps
/// what was already written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerState {
    Active,
    Inactive,
}

impl ListenerState {
    pub fn is_active(self) -> bool {
        self == ListenerState::Active
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerState::Active => write!(f, "active"),
            ListenerState::Inactive => write!(f, "inactive"),
        }
    }
}

/// Read-only description of a listener, for status output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerInfo {
    pub id: ListenerId,
    /// Document field the listener reads.
    pub key: String,
    pub model: String,
    pub modality: Modality,
    pub space: EmbeddingSpace,
    pub state: ListenerState,
}
