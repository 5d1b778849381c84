//! JSON snapshots of an in-memory vector store.
//!
//! A snapshot is a flat dump of every `(id, vector)` entry plus the space,
//! metric and primary modality it was built with. Writes go to a sibling temp
//! file that is renamed into place, so a crash never leaves a truncated
//! snapshot behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vindex_core::vector::{InMemoryVectorStore, VectorStore};
use vindex_types::config::EmptyStorePolicy;
use vindex_types::document::DocumentId;
use vindex_types::embedding::{DistanceMetric, EmbeddingSpace, Modality};
use vindex_types::error::IndexError;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk snapshot layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub index: String,
    pub space: EmbeddingSpace,
    pub metric: DistanceMetric,
    /// Modality of the listener that wrote the vectors.
    pub modality: Modality,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: DocumentId,
    pub vector: Vec<f32>,
}

/// A snapshot turned back into a live store.
pub struct LoadedSnapshot {
    pub index: String,
    pub space: EmbeddingSpace,
    pub modality: Modality,
    pub created_at: DateTime<Utc>,
    pub store: InMemoryVectorStore,
}

/// Dump `store` to `path`. Returns the number of entries written.
pub async fn save_snapshot<S: VectorStore>(
    store: &S,
    index: &str,
    space: &EmbeddingSpace,
    modality: Modality,
    path: &Path,
) -> Result<usize, IndexError> {
    if space.dimension != store.dimension() {
        return Err(IndexError::DimensionMismatch {
            expected: store.dimension(),
            actual: space.dimension,
        });
    }

    let entries: Vec<SnapshotEntry> = store
        .entries()
        .await
        .into_iter()
        .map(|(id, vector)| SnapshotEntry { id, vector })
        .collect();
    let count = entries.len();

    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        index: index.to_string(),
        space: space.clone(),
        metric: store.metric(),
        modality,
        created_at: Utc::now(),
        entries,
    };
    let bytes = serde_json::to_vec(&snapshot)
        .map_err(|e| IndexError::Snapshot(format!("failed to encode snapshot: {e}")))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error("create directory", parent, e))?;
    }
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| io_error("write", &tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error("rename", &tmp, e))?;

    tracing::info!(
        index,
        entries = count,
        path = %path.display(),
        "saved snapshot"
    );
    Ok(count)
}

/// Read and decode a snapshot file without building a store.
pub async fn read_snapshot(path: &Path) -> Result<Snapshot, IndexError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| io_error("read", path, e))?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)
        .map_err(|e| IndexError::Snapshot(format!("malformed snapshot {}: {e}", path.display())))?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(IndexError::Snapshot(format!(
            "unsupported snapshot version {} in {} (expected {SNAPSHOT_VERSION})",
            snapshot.version,
            path.display()
        )));
    }
    Ok(snapshot)
}

/// Load a snapshot into a fresh in-memory store.
///
/// Fails with `DimensionMismatch` if any entry disagrees with the recorded
/// space dimension.
pub async fn load_snapshot(
    path: &Path,
    policy: EmptyStorePolicy,
) -> Result<LoadedSnapshot, IndexError> {
    let snapshot = read_snapshot(path).await?;
    let count = snapshot.entries.len();

    let store = InMemoryVectorStore::from_entries(
        snapshot.space.dimension,
        snapshot.metric,
        snapshot.entries.into_iter().map(|e| (e.id, e.vector)),
    )?
    .with_empty_policy(policy);

    tracing::debug!(
        index = %snapshot.index,
        entries = count,
        path = %path.display(),
        "loaded snapshot"
    );

    Ok(LoadedSnapshot {
        index: snapshot.index,
        space: snapshot.space,
        modality: snapshot.modality,
        created_at: snapshot.created_at,
        store,
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> IndexError {
    IndexError::Snapshot(format!("failed to {action} {}: {err}", path.display()))
}
