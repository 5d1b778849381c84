//! Vector index: one primary listener populating a store, plus compatible
//! listeners that only embed queries.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use vindex_types::config::VindexConfig;
use vindex_types::document::{Document, DocumentEvent, DocumentId, FieldValue};
use vindex_types::embedding::SearchHit;
use vindex_types::error::IndexError;
use vindex_types::index::{BuildReport, DocumentOutcome, IndexInfo};
use vindex_types::listener::{ListenerId, ListenerState};

use crate::document::DocumentSource;
use crate::embedding::Embedder;
use crate::listener::{Listener, ListenerRegistry};
use crate::vector::VectorStore;

/// Runtime knobs for builds and queries.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSettings {
    /// Inference batches in flight at once during a build.
    pub max_concurrent_batches: usize,
    /// Upper bound on one inference call. `None` waits forever.
    pub inference_timeout: Option<Duration>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self::from(&VindexConfig::default())
    }
}

impl From<&VindexConfig> for IndexSettings {
    fn from(config: &VindexConfig) -> Self {
        Self {
            max_concurrent_batches: config.max_concurrent_batches.max(1),
            inference_timeout: (config.inference_timeout_secs > 0)
                .then(|| Duration::from_secs(config.inference_timeout_secs)),
        }
    }
}

/// Bookkeeping that orders event writes against running backfills.
#[derive(Debug, Default)]
struct WriteState {
    /// Backfills currently running.
    backfills: usize,
    /// Documents changed by events while a backfill runs. Backfill batches
    /// never overwrite them.
    touched: BTreeSet<DocumentId>,
}

/// A named index over one vector store.
///
/// The primary listener is the only writer. Compatible listeners share the
/// primary's embedding space and are used at query time to embed values of
/// another modality (e.g. text queries against an image index).
pub struct VectorIndex<S, I, T> {
    name: String,
    store: Arc<S>,
    registry: Arc<ListenerRegistry<I, T>>,
    primary: ListenerId,
    compatible: RwLock<BTreeSet<ListenerId>>,
    settings: IndexSettings,
    writes: Mutex<WriteState>,
}

impl<S, I, T> VectorIndex<S, I, T>
where
    S: VectorStore,
    I: Embedder,
    T: Embedder,
{
    /// Create an index and register its primary listener.
    ///
    /// Fails with `DimensionMismatch` if the listener's space does not match
    /// the store, or `ListenerExists` if the listener id is already taken.
    pub fn new(
        name: impl Into<String>,
        store: Arc<S>,
        registry: Arc<ListenerRegistry<I, T>>,
        primary: Listener<I, T>,
        settings: IndexSettings,
    ) -> Result<Self, IndexError> {
        let dimension = primary.space().dimension;
        if dimension != store.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: store.dimension(),
                actual: dimension,
            });
        }

        let primary = registry.register(primary)?;
        let name = name.into();
        tracing::info!(
            index = %name,
            primary = %primary.id(),
            space = %primary.space(),
            metric = %store.metric(),
            "created vector index"
        );

        Ok(Self {
            name,
            store,
            registry,
            primary: primary.id().clone(),
            compatible: RwLock::new(BTreeSet::new()),
            settings,
            writes: Mutex::new(WriteState::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn primary_id(&self) -> &ListenerId {
        &self.primary
    }

    /// The primary listener. Fails with `UnknownListener` if it was removed
    /// from the registry.
    pub fn primary(&self) -> Result<Arc<Listener<I, T>>, IndexError> {
        self.registry.resolve(&self.primary)
    }

    /// Compatible listener ids, sorted.
    pub async fn compatible_ids(&self) -> Vec<ListenerId> {
        self.compatible.read().await.iter().cloned().collect()
    }

    /// Run the primary listener over `documents`.
    pub async fn build(&self, documents: Vec<Document>) -> Result<BuildReport, IndexError> {
        self.build_with_cancel(documents, CancellationToken::new())
            .await
    }

    /// Run the primary listener over `documents`, checking `cancel` before
    /// each batch starts.
    ///
    /// Per-document failures are collected in the report. Batches that were
    /// committed before cancellation stay in the store; documents of batches
    /// that never started are counted as skipped.
    #[tracing::instrument(
        skip(self, documents, cancel),
        fields(index = %self.name, documents = documents.len())
    )]
    pub async fn build_with_cancel(
        &self,
        documents: Vec<Document>,
        cancel: CancellationToken,
    ) -> Result<BuildReport, IndexError> {
        let primary = self.primary()?;
        let batch_size = primary.batch_size().max(1);

        let mut batches = Vec::new();
        let mut documents = documents.into_iter().peekable();
        while documents.peek().is_some() {
            batches.push(documents.by_ref().take(batch_size).collect::<Vec<_>>());
        }

        let reports: Vec<BuildReport> = stream::iter(batches)
            .map(|batch| self.build_batch(Arc::clone(&primary), batch, cancel.clone()))
            .buffer_unordered(self.settings.max_concurrent_batches.max(1))
            .collect()
            .await;

        let mut report = BuildReport::default();
        for batch_report in reports {
            report.merge(batch_report);
        }
        report.sort();

        if report.cancelled {
            tracing::warn!(
                succeeded = report.success_count(),
                failed = report.failure_count(),
                skipped = report.skipped,
                "build cancelled"
            );
        } else {
            tracing::info!(
                succeeded = report.success_count(),
                failed = report.failure_count(),
                skipped = report.skipped,
                "build finished"
            );
        }
        Ok(report)
    }

    async fn build_batch(
        &self,
        primary: Arc<Listener<I, T>>,
        batch: Vec<Document>,
        cancel: CancellationToken,
    ) -> BuildReport {
        let mut report = BuildReport::default();
        if cancel.is_cancelled() {
            report.skipped = batch.len();
            report.cancelled = true;
            return report;
        }
        if !primary.is_active() {
            report.skipped = batch.len();
            return report;
        }

        tracing::debug!(batch = batch.len(), "indexing batch");
        let mut pending = primary
            .embed_documents(&batch, self.settings.inference_timeout)
            .await;

        let writes = self.writes.lock().await;
        if !primary.is_active() {
            pending.discard_all();
        } else if !writes.touched.is_empty() {
            let dropped = pending.discard(&writes.touched);
            if dropped > 0 {
                tracing::debug!(dropped, "kept event writes over stale backfill vectors");
            }
        }
        for (id, outcome) in pending.commit(self.store.as_ref()).await {
            report.record(id, outcome);
        }
        drop(writes);

        report
    }

    /// Embed `value` with the chosen listener and return the `k` nearest
    /// documents.
    ///
    /// `using` defaults to the primary listener. Any other id must belong to
    /// a compatible listener of this index.
    #[tracing::instrument(skip(self, value), fields(index = %self.name, kind = value.kind()))]
    pub async fn search(
        &self,
        value: &FieldValue,
        using: Option<&ListenerId>,
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidK(k));
        }

        let id = using.unwrap_or(&self.primary);
        if *id != self.primary && !self.compatible.read().await.contains(id) {
            return Err(IndexError::UnknownListener(id.clone()));
        }

        let listener = self.registry.resolve(id)?;
        let vector = listener
            .embed_value(value, self.settings.inference_timeout)
            .await?;
        let hits = self.store.query(&vector, k).await?;
        tracing::debug!(listener = %id, hits = hits.len(), "search finished");
        Ok(hits)
    }

    /// Query with a vector that is already in the index's space.
    pub async fn search_vector(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        self.store.query(vector, k).await
    }

    /// Register a query-time listener.
    ///
    /// The listener is forced inactive and never writes to the store. On any
    /// error the compatible set is left unchanged.
    #[tracing::instrument(skip(self, listener), fields(index = %self.name, listener = %listener.id()))]
    pub async fn add_compatible(&self, listener: Listener<I, T>) -> Result<ListenerId, IndexError> {
        let primary = self.primary()?;
        let expected = primary.space();
        let actual = listener.space();

        if actual.dimension != expected.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: expected.dimension,
                actual: actual.dimension,
            });
        }
        if actual.name != expected.name {
            return Err(IndexError::IncompatibleSpace {
                expected: expected.name.clone(),
                actual: actual.name.clone(),
            });
        }

        let mut compatible = self.compatible.write().await;
        listener.deactivate();
        let listener = self.registry.register(listener)?;
        let id = listener.id().clone();
        compatible.insert(id.clone());

        tracing::info!(model = listener.source().model_name(), "added compatible listener");
        Ok(id)
    }

    /// Unregister a compatible listener.
    pub async fn remove_compatible(&self, id: &ListenerId) -> Result<(), IndexError> {
        let mut compatible = self.compatible.write().await;
        if !compatible.remove(id) {
            return Err(IndexError::UnknownListener(id.clone()));
        }
        self.registry.remove(id);
        tracing::info!(index = %self.name, listener = %id, "removed compatible listener");
        Ok(())
    }

    /// Activate the primary listener and backfill from `source`.
    ///
    /// Activating an already active primary does nothing and returns an
    /// empty report. If listing documents fails, the primary goes back to
    /// inactive. Events applied while the backfill runs take precedence over
    /// the backfill's copy of the same document.
    #[tracing::instrument(skip(self, source), fields(index = %self.name))]
    pub async fn activate(&self, source: &impl DocumentSource) -> Result<BuildReport, IndexError> {
        let primary = self.primary()?;
        {
            let mut writes = self.writes.lock().await;
            if !primary.activate() {
                tracing::debug!("primary listener already active");
                return Ok(BuildReport::default());
            }
            writes.backfills += 1;
        }

        let result = match source.list().await {
            Ok(documents) => {
                tracing::info!(documents = documents.len(), "backfilling after activation");
                self.build(documents).await
            }
            Err(err) => {
                primary.deactivate();
                Err(err)
            }
        };

        let mut writes = self.writes.lock().await;
        writes.backfills = writes.backfills.saturating_sub(1);
        if writes.backfills == 0 {
            writes.touched.clear();
        }
        result
    }

    /// Stop the primary listener from writing. Existing vectors stay.
    ///
    /// Returns whether the state changed.
    pub fn deactivate(&self) -> Result<bool, IndexError> {
        let changed = self.primary()?.deactivate();
        if changed {
            tracing::info!(index = %self.name, "primary listener deactivated");
        }
        Ok(changed)
    }

    /// Apply a batch of document events through the primary listener.
    ///
    /// Only the last event per document counts. Events are applied only
    /// while the primary is active; otherwise they are counted as skipped.
    /// Writes are serialized against backfill commits.
    #[tracing::instrument(skip(self, events), fields(index = %self.name, events = events.len()))]
    pub async fn apply(&self, events: Vec<DocumentEvent>) -> Result<BuildReport, IndexError> {
        let primary = self.primary()?;

        let mut latest: BTreeMap<DocumentId, DocumentEvent> = BTreeMap::new();
        for event in events {
            latest.insert(event.document_id().clone(), event);
        }

        let mut upserts = Vec::new();
        let mut removals = Vec::new();
        for (id, event) in latest {
            match event {
                DocumentEvent::Upserted(doc) => upserts.push(doc),
                DocumentEvent::Removed(_) => removals.push(id),
            }
        }

        let mut report = BuildReport::default();
        if !primary.is_active() {
            report.skipped = upserts.len() + removals.len();
            return Ok(report);
        }

        let mut pending = primary
            .embed_documents(&upserts, self.settings.inference_timeout)
            .await;

        let mut writes = self.writes.lock().await;
        let active = primary.is_active();
        if !active {
            pending.discard_all();
        }
        for (id, outcome) in pending.commit(self.store.as_ref()).await {
            report.record(id, outcome);
        }

        for id in &removals {
            if !active {
                report.skipped += 1;
                continue;
            }
            match self.store.remove(id).await {
                Ok(true) => report.removed += 1,
                Ok(false) => {}
                Err(err) => report.record(id.clone(), DocumentOutcome::Failed(err)),
            }
        }

        if active && writes.backfills > 0 {
            writes
                .touched
                .extend(upserts.into_iter().map(|doc| doc.id).chain(removals));
        }
        drop(writes);

        report.sort();
        tracing::debug!(
            succeeded = report.success_count(),
            failed = report.failure_count(),
            removed = report.removed,
            "applied document events"
        );
        Ok(report)
    }

    /// Snapshot of the index's shape and size.
    pub async fn info(&self) -> Result<IndexInfo, IndexError> {
        let primary = self.primary()?;
        let compatible = self
            .compatible
            .read()
            .await
            .iter()
            .filter_map(|id| self.registry.get(id))
            .map(|listener| listener.info())
            .collect();

        Ok(IndexInfo {
            name: self.name.clone(),
            primary: primary.info(),
            compatible,
            space: primary.space().clone(),
            metric: self.store.metric(),
            vector_count: self.store.len().await,
        })
    }

    /// Whether the primary listener is currently writing.
    pub fn primary_state(&self) -> Result<ListenerState, IndexError> {
        Ok(self.primary()?.state())
    }
}
