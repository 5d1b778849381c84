//! Filesystem document sources.

pub mod directory;
pub mod watcher;

pub use directory::{DirectoryDocumentStore, FileKind, IMAGE_FIELD, TEXT_FIELD};
pub use watcher::{WatchError, WatcherHandle, publish_changes, start_document_watcher};
