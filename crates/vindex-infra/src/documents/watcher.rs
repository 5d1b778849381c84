//! Filesystem watcher that turns file changes under a document directory
//! into document events.
//!
//! Provides:
//! - `start_document_watcher()` -- starts a debounced watcher on the root
//! - `WatcherHandle` -- RAII handle that keeps the watcher alive
//! - `publish_changes()` -- maps changed paths to `Upserted`/`Removed` events

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Use notify types re-exported through notify-debouncer-mini so they match
// the version the debouncer was compiled against.
use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use vindex_core::event::DocumentEventBus;
use vindex_types::document::DocumentEvent;

use super::directory::{DirectoryDocumentStore, FileKind};

/// Debounce window used when the caller does not pick one.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Errors that can occur while starting a watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watcher creation failed: {0}")]
    WatcherCreation(String),

    #[error("failed to watch path '{path}': {reason}")]
    WatchPath { path: String, reason: String },
}

/// RAII handle that keeps a document watcher alive.
///
/// Dropping it stops the filesystem watcher and the task that publishes
/// document events.
pub struct WatcherHandle {
    _debouncer: Debouncer<RecommendedWatcher>,
    publisher: JoinHandle<()>,
    root: PathBuf,
}

impl WatcherHandle {
    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.publisher.abort();
        tracing::debug!(root = %self.root.display(), "document watcher dropped");
    }
}

/// Publish one event per distinct changed path.
///
/// Existing supported files become `Upserted`; supported paths that no
/// longer exist become `Removed`. Other paths are ignored. Returns the number
/// of events published.
pub async fn publish_changes(
    store: &DirectoryDocumentStore,
    bus: &DocumentEventBus,
    paths: impl IntoIterator<Item = PathBuf>,
) -> usize {
    let paths: BTreeSet<PathBuf> = paths.into_iter().collect();
    let mut published = 0;

    for path in paths {
        if FileKind::from_path(&path).is_none() {
            continue;
        }
        let Some(id) = store.document_id(&path) else {
            continue;
        };

        let event = match store.load_path(&path).await {
            Ok(Some(document)) => DocumentEvent::Upserted(document),
            Ok(None) => DocumentEvent::Removed(id),
            Err(err) => {
                tracing::warn!(document_id = %id, error = %err, "failed to load changed document");
                continue;
            }
        };

        tracing::debug!(document_id = %event.document_id(), "document changed");
        bus.publish(event);
        published += 1;
    }

    published
}

/// Start a debounced watcher on the store's root directory.
///
/// Changed paths are collected on the watcher thread and handed to a tokio
/// task that loads them and publishes document events on `bus`. Must be
/// called from within a tokio runtime.
pub fn start_document_watcher(
    store: Arc<DirectoryDocumentStore>,
    bus: DocumentEventBus,
    debounce: Option<Duration>,
) -> Result<WatcherHandle, WatchError> {
    let (tx, mut rx) = mpsc::channel::<Vec<PathBuf>>(64);
    let root = store.root().to_path_buf();

    let mut debouncer = new_debouncer(
        debounce.unwrap_or(DEFAULT_DEBOUNCE),
        move |result: DebounceEventResult| match result {
            Ok(events) => {
                let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                if paths.is_empty() {
                    return;
                }
                // Non-blocking: if the publisher falls far behind, drop the
                // batch rather than stall the watcher thread.
                if tx.try_send(paths).is_err() {
                    tracing::warn!("document watcher queue full, dropping change batch");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "document watcher error");
            }
        },
    )
    .map_err(|e| WatchError::WatcherCreation(e.to_string()))?;

    debouncer
        .watcher()
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| WatchError::WatchPath {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;

    let publisher = tokio::spawn(async move {
        while let Some(paths) = rx.recv().await {
            publish_changes(&store, &bus, paths).await;
        }
    });

    tracing::info!(root = %root.display(), "document watcher started");

    Ok(WatcherHandle {
        _debouncer: debouncer,
        publisher,
        root,
    })
}
