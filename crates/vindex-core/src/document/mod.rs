//! Document source port.
//!
//! The index never owns documents; it reads them through this trait when it
//! needs the full corpus (initial build, backfill on activation).

pub mod memory;

pub use memory::InMemoryDocumentSource;

use vindex_types::document::{Document, DocumentId};
use vindex_types::error::IndexError;

/// Trait for anything that can enumerate documents.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait DocumentSource: Send + Sync {
    /// Every document, ordered by id.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Document>, IndexError>> + Send;

    /// A single document, or `None` if it does not exist.
    fn get(
        &self,
        id: &DocumentId,
    ) -> impl std::future::Future<Output = Result<Option<Document>, IndexError>> + Send;
}
