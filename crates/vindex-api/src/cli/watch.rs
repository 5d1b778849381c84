//! `vindex watch`: keep an index current while files change.
//!
//! The primary listener starts inactive. The dispatcher and the filesystem
//! watcher are started first, then activation backfills from the directory,
//! so edits made during the backfill are not lost.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use console::style;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use vindex_core::event::{DocumentEventBus, ListenerDispatcher};
use vindex_infra::config::resolve_batch_size;
use vindex_infra::documents::{DirectoryDocumentStore, start_document_watcher};
use vindex_observe::attrs;
use vindex_types::embedding::Modality;

use crate::cli::build::{print_report, spinner};
use crate::state::{AppState, BuildOverrides};

#[allow(clippy::too_many_arguments)]
pub async fn watch(
    state: &AppState,
    name: &str,
    dir: &Path,
    modality: Modality,
    batch_size: Option<usize>,
    debounce: Duration,
    json: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let documents = Arc::new(
        DirectoryDocumentStore::open(dir)
            .await
            .with_context(|| format!("cannot open document directory {}", dir.display()))?,
    );

    let overrides = BuildOverrides {
        batch_size,
        concurrency: None,
    };
    let index = state
        .create_index(name, modality, state.new_store(), overrides)
        .await
        .with_context(|| format!("failed to create index '{name}'"))?;
    index.deactivate()?;

    let bus = DocumentEventBus::new(state.config.event_channel_capacity);
    let cancel = CancellationToken::new();
    let dispatcher = ListenerDispatcher::new(
        Arc::clone(&index),
        resolve_batch_size(&state.config, batch_size),
    )
    .spawn(bus.subscribe(), cancel.clone());
    let watcher = start_document_watcher(Arc::clone(&documents), bus.clone(), Some(debounce))?;

    let progress = spinner(json || quiet, "Backfilling index...".to_string())?;
    let span = tracing::info_span!(
        "vindex.watch",
        { attrs::OPERATION_NAME } = attrs::OP_WATCH,
        { attrs::INDEX_NAME } = name,
    );
    let report = index
        .activate(documents.as_ref())
        .instrument(span)
        .await
        .with_context(|| format!("failed to backfill index '{name}'"))?;
    let saved = state.save_index(&index).await?;
    progress.finish_and_clear();
    print_report(state, name, modality, &report, saved, json)?;

    if !json && !quiet {
        println!(
            "  {} Watching {} (Ctrl+C to stop)",
            style("●").green(),
            style(watcher.root().display()).cyan()
        );
        println!();
    }

    crate::shutdown_signal().await;

    drop(watcher);
    cancel.cancel();
    let stats = dispatcher.await.context("dispatcher task failed")?;
    let saved = state.save_index(&index).await?;

    if json {
        let out = serde_json::json!({
            "index": name,
            "vectors": saved,
            "events": stats.events,
            "succeeded": stats.succeeded,
            "failed": stats.failed,
            "removed": stats.removed,
            "lagged": stats.lagged,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if !quiet {
        println!();
        println!(
            "  {} Stopped. {} events applied ({} updated, {} removed, {} failed), {} vectors saved.",
            style("✓").green().bold(),
            stats.events,
            stats.succeeded,
            stats.removed,
            stats.failed,
            saved
        );
        println!();
    }

    Ok(())
}
