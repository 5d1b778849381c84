//! Application state wiring the index catalog to the concrete embedders.
//!
//! The core index types are generic over store and embedder traits; AppState
//! pins them to the in-memory store and the fastembed CLIP towers. Every
//! index gets two listeners, `{name}/image` and `{name}/text`: the one
//! matching the index's modality is the primary writer, the other is a
//! query-time compatible listener.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use vindex_core::embedding::EmbeddingSource;
use vindex_core::index::{IndexCatalog, IndexSettings, VectorIndex};
use vindex_core::listener::{Listener, ListenerRegistry};
use vindex_core::vector::{InMemoryVectorStore, VectorStore};
use vindex_infra::config::{
    load_config, resolve_batch_size, resolve_concurrency, resolve_inference_timeout,
};
use vindex_infra::documents::{IMAGE_FIELD, TEXT_FIELD};
use vindex_infra::embedding::clip::CLIP_DIMENSION;
use vindex_infra::embedding::{ClipImageEmbedder, ClipOptions, ClipTextEmbedder, clip_space};
use vindex_infra::filesystem::{
    list_snapshots, resolve_data_dir, snapshot_path, validate_index_name,
};
use vindex_infra::vector::{load_snapshot, read_snapshot, save_snapshot};
use vindex_types::config::VindexConfig;
use vindex_types::embedding::{DistanceMetric, EmbeddingSpace, Modality};
use vindex_types::error::IndexError;
use vindex_types::listener::ListenerId;

/// Concrete type aliases for the index generics pinned to infra implementations.
pub type ConcreteListener = Listener<ClipImageEmbedder, ClipTextEmbedder>;

pub type ConcreteRegistry = ListenerRegistry<ClipImageEmbedder, ClipTextEmbedder>;

pub type ConcreteIndex = VectorIndex<InMemoryVectorStore, ClipImageEmbedder, ClipTextEmbedder>;

pub type ConcreteCatalog = IndexCatalog<InMemoryVectorStore, ClipImageEmbedder, ClipTextEmbedder>;

/// Per-run overrides of the configured build knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOverrides {
    pub batch_size: Option<usize>,
    pub concurrency: Option<usize>,
}

/// One saved index as listed by `status` and `GET /api/v1/indexes`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub name: String,
    pub modality: Modality,
    pub space: EmbeddingSpace,
    pub metric: DistanceMetric,
    pub vector_count: usize,
    pub created_at: DateTime<Utc>,
    /// Whether the index is loaded in this process.
    pub loaded: bool,
}

/// Shared application state.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: Arc<VindexConfig>,
    pub catalog: Arc<ConcreteCatalog>,
    pub registry: Arc<ConcreteRegistry>,
    /// Serializes snapshot loads so concurrent requests never register the
    /// same listener twice.
    open_lock: Arc<Mutex<()>>,
}

impl AppState {
    /// Initialize the application state: resolve the data directory and load
    /// configuration.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;
        let config = load_config(&data_dir).await;
        Ok(Self::new(data_dir, config))
    }

    pub fn new(data_dir: PathBuf, config: VindexConfig) -> Self {
        Self {
            data_dir,
            config: Arc::new(config),
            catalog: Arc::new(ConcreteCatalog::new()),
            registry: Arc::new(ConcreteRegistry::new()),
            open_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Listener id for one tower of an index.
    pub fn listener_id(index: &str, modality: Modality) -> ListenerId {
        ListenerId::new(format!("{index}/{modality}"))
    }

    /// An empty store with the configured metric and empty-store policy.
    pub fn new_store(&self) -> InMemoryVectorStore {
        InMemoryVectorStore::new(CLIP_DIMENSION, self.config.metric)
            .with_empty_policy(self.config.empty_store_policy)
    }

    fn clip_options(&self, overrides: BuildOverrides) -> ClipOptions {
        ClipOptions {
            cache_dir: Some(
                self.config
                    .model_cache_dir
                    .clone()
                    .unwrap_or_else(|| self.data_dir.join("models")),
            ),
            batch_size: resolve_batch_size(&self.config, overrides.batch_size),
            show_download_progress: false,
        }
    }

    fn settings(&self, overrides: BuildOverrides) -> IndexSettings {
        IndexSettings {
            max_concurrent_batches: resolve_concurrency(&self.config, overrides.concurrency),
            inference_timeout: resolve_inference_timeout(&self.config),
        }
    }

    fn listener(&self, index: &str, modality: Modality, options: ClipOptions) -> ConcreteListener {
        let id = Self::listener_id(index, modality);
        match modality {
            Modality::Image => Listener::new(
                id,
                IMAGE_FIELD,
                EmbeddingSource::Image(ClipImageEmbedder::new(options)),
            ),
            Modality::Text => Listener::new(
                id,
                TEXT_FIELD,
                EmbeddingSource::Text(ClipTextEmbedder::new(options)),
            ),
        }
    }

    /// Create an index over `store` and add it to the catalog.
    ///
    /// The tower matching `modality` becomes the primary listener; the other
    /// tower is attached as a compatible listener.
    pub async fn create_index(
        &self,
        name: &str,
        modality: Modality,
        store: InMemoryVectorStore,
        overrides: BuildOverrides,
    ) -> Result<Arc<ConcreteIndex>, IndexError> {
        validate_index_name(name)?;
        let options = self.clip_options(overrides);
        let index = VectorIndex::new(
            name,
            Arc::new(store),
            Arc::clone(&self.registry),
            self.listener(name, modality, options.clone()),
            self.settings(overrides),
        )?;
        index
            .add_compatible(self.listener(name, counterpart(modality), options))
            .await?;
        self.catalog.create(index)
    }

    /// Get an index from the catalog, loading its snapshot on first use.
    ///
    /// Fails with `InvalidName` for names that are not usable as a snapshot
    /// file stem, and with `IndexNotFound` when no snapshot exists.
    pub async fn open_index(&self, name: &str) -> Result<Arc<ConcreteIndex>, IndexError> {
        validate_index_name(name)?;
        if let Some(index) = self.catalog.get(name) {
            return Ok(index);
        }

        let _guard = self.open_lock.lock().await;
        if let Some(index) = self.catalog.get(name) {
            return Ok(index);
        }

        let path = snapshot_path(&self.data_dir, name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(IndexError::IndexNotFound(name.to_string()));
        }

        let loaded = load_snapshot(&path, self.config.empty_store_policy).await?;
        let expected = clip_space();
        if loaded.space != expected {
            return Err(IndexError::IncompatibleSpace {
                expected: expected.to_string(),
                actual: loaded.space.to_string(),
            });
        }

        self.create_index(name, loaded.modality, loaded.store, BuildOverrides::default())
            .await
    }

    /// Summaries of every index with a snapshot on disk, sorted by name.
    ///
    /// Unreadable snapshots are logged and left out.
    pub async fn index_summaries(&self) -> anyhow::Result<Vec<IndexSummary>> {
        let mut summaries = Vec::new();
        for name in list_snapshots(&self.data_dir).await? {
            let snapshot = match read_snapshot(&snapshot_path(&self.data_dir, &name)).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    tracing::warn!(index = %name, error = %err, "skipping unreadable snapshot");
                    continue;
                }
            };

            let loaded = self.catalog.get(&name);
            let vector_count = match &loaded {
                Some(index) => index.store().len().await,
                None => snapshot.entries.len(),
            };
            summaries.push(IndexSummary {
                name,
                modality: snapshot.modality,
                space: snapshot.space,
                metric: snapshot.metric,
                vector_count,
                created_at: snapshot.created_at,
                loaded: loaded.is_some(),
            });
        }
        Ok(summaries)
    }

    /// Write an index's store to its snapshot file.
    pub async fn save_index(&self, index: &ConcreteIndex) -> Result<usize, IndexError> {
        let modality = index.primary()?.modality();
        save_snapshot(
            index.store().as_ref(),
            index.name(),
            &clip_space(),
            modality,
            &snapshot_path(&self.data_dir, index.name()),
        )
        .await
    }
}

/// The other CLIP tower.
pub fn counterpart(modality: Modality) -> Modality {
    match modality {
        Modality::Image => Modality::Text,
        Modality::Text => Modality::Image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vindex_types::listener::ListenerState;

    fn state(dir: &TempDir) -> AppState {
        AppState::new(dir.path().to_path_buf(), VindexConfig::default())
    }

    #[tokio::test]
    async fn create_index_wires_both_towers() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let index = state
            .create_index("photos", Modality::Image, state.new_store(), BuildOverrides::default())
            .await
            .unwrap();

        assert_eq!(index.primary_id().as_str(), "photos/image");
        assert_eq!(
            index.compatible_ids().await,
            vec![ListenerId::from("photos/text")]
        );
        let text = state.registry.get(&"photos/text".into()).unwrap();
        assert_eq!(text.state(), ListenerState::Inactive);
        assert_eq!(text.key(), TEXT_FIELD);
        assert_eq!(state.catalog.names(), vec!["photos".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_index_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        state
            .create_index("notes", Modality::Text, state.new_store(), BuildOverrides::default())
            .await
            .unwrap();

        let err = state
            .create_index("notes", Modality::Text, state.new_store(), BuildOverrides::default())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, IndexError::ListenerExists(_)));
    }

    #[tokio::test]
    async fn open_index_without_snapshot_is_not_found() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let err = state.open_index("missing").await.err().unwrap();

        assert_eq!(err, IndexError::IndexNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn names_outside_the_indexes_dir_are_rejected() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        tokio::fs::create_dir_all(data_dir.join("indexes")).await.unwrap();
        tokio::fs::write(data_dir.join("outside.json"), "{}").await.unwrap();
        let state = AppState::new(data_dir, VindexConfig::default());

        let err = state.open_index("../outside").await.err().unwrap();
        assert_eq!(err, IndexError::InvalidName("../outside".to_string()));

        let err = state
            .create_index("a/b", Modality::Text, state.new_store(), BuildOverrides::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err, IndexError::InvalidName("a/b".to_string()));

        assert!(state.catalog.names().is_empty());
        assert!(state.registry.ids().is_empty());
    }

    #[tokio::test]
    async fn saved_index_reopens_with_its_modality() {
        let dir = TempDir::new().unwrap();
        let writer = state(&dir);
        let index = writer
            .create_index("notes", Modality::Text, writer.new_store(), BuildOverrides::default())
            .await
            .unwrap();
        let mut vector = vec![0.0; CLIP_DIMENSION];
        vector[0] = 1.0;
        index.store().upsert(&"a.txt".into(), &vector).await.unwrap();
        assert_eq!(writer.save_index(&index).await.unwrap(), 1);

        let reader = state(&dir);
        let reopened = reader.open_index("notes").await.unwrap();

        assert_eq!(reopened.primary_id().as_str(), "notes/text");
        assert_eq!(reopened.store().len().await, 1);
        assert!(Arc::ptr_eq(&reopened, &reader.open_index("notes").await.unwrap()));
    }

    #[tokio::test]
    async fn summaries_list_saved_indexes() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        for (name, modality) in [("photos", Modality::Image), ("notes", Modality::Text)] {
            let index = state
                .create_index(name, modality, state.new_store(), BuildOverrides::default())
                .await
                .unwrap();
            state.save_index(&index).await.unwrap();
        }
        tokio::fs::write(snapshot_path(dir.path(), "broken"), "{")
            .await
            .unwrap();

        let summaries = state.index_summaries().await.unwrap();

        let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["notes", "photos"]);
        assert_eq!(summaries[1].modality, Modality::Image);
        assert_eq!(summaries[1].space, clip_space());
        assert!(summaries.iter().all(|s| s.loaded && s.vector_count == 0));
    }

    #[test]
    fn overrides_feed_settings() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let settings = state.settings(BuildOverrides {
            batch_size: None,
            concurrency: Some(0),
        });

        assert_eq!(settings.max_concurrent_batches, 1);
        assert_eq!(
            state.clip_options(BuildOverrides::default()).cache_dir,
            Some(dir.path().join("models"))
        );
    }

    #[test]
    fn counterpart_swaps_towers() {
        assert_eq!(counterpart(Modality::Image), Modality::Text);
        assert_eq!(counterpart(Modality::Text), Modality::Image);
        assert_eq!(
            AppState::listener_id("photos", Modality::Image).as_str(),
            "photos/image"
        );
    }
}
