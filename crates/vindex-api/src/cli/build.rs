//! `vindex build`: embed a document directory into a fresh index and save it.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use vindex_core::document::DocumentSource;
use vindex_infra::documents::DirectoryDocumentStore;
use vindex_infra::filesystem::snapshot_path;
use vindex_observe::attrs;
use vindex_types::embedding::Modality;
use vindex_types::index::{BuildReport, FailureKind};

use crate::state::{AppState, BuildOverrides};

/// Longest failure message shown in the report table.
const MAX_MESSAGE_WIDTH: usize = 60;

/// Spinner for long-running steps. Hidden for `--json` and `--quiet`.
pub fn spinner(hidden: bool, message: String) -> anyhow::Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    Ok(spinner)
}

/// Build the index `name` from every document under `dir`.
///
/// Ctrl+C stops the build after the batches already in flight; their vectors
/// are kept and saved.
pub async fn build_index(
    state: &AppState,
    name: &str,
    dir: &Path,
    modality: Modality,
    overrides: BuildOverrides,
    json: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let documents = DirectoryDocumentStore::open(dir)
        .await
        .with_context(|| format!("cannot open document directory {}", dir.display()))?;
    let documents = documents.list().await?;
    let count = documents.len();

    let index = state
        .create_index(name, modality, state.new_store(), overrides)
        .await
        .with_context(|| format!("failed to create index '{name}'"))?;

    let progress = spinner(json || quiet, format!("Embedding {count} documents..."))?;

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, finishing batches in flight");
                cancel.cancel();
            }
        }
    });

    let span = tracing::info_span!(
        "vindex.build",
        { attrs::OPERATION_NAME } = attrs::OP_BUILD,
        { attrs::INDEX_NAME } = name,
        { attrs::DOCUMENT_COUNT } = count,
    );
    let result = index.build_with_cancel(documents, cancel).instrument(span).await;
    interrupt.abort();
    let report = result?;

    progress.set_message("Saving snapshot...");
    let saved = state
        .save_index(&index)
        .await
        .with_context(|| format!("failed to save index '{name}'"))?;
    progress.finish_and_clear();

    print_report(state, name, modality, &report, saved, json)
}

/// Print a build report as JSON or as a styled summary plus failure table.
pub fn print_report(
    state: &AppState,
    name: &str,
    modality: Modality,
    report: &BuildReport,
    vectors: usize,
    json: bool,
) -> anyhow::Result<()> {
    let snapshot = snapshot_path(&state.data_dir, name);

    if json {
        let out = serde_json::json!({
            "index": name,
            "modality": modality,
            "vectors": vectors,
            "snapshot": snapshot.display().to_string(),
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let headline = if report.cancelled {
        style("!").yellow().bold()
    } else {
        style("✓").green().bold()
    };

    println!();
    println!(
        "  {} Index '{}' {}",
        headline,
        style(name).cyan(),
        if report.cancelled { "partially built (cancelled)" } else { "built" }
    );
    println!();
    println!("  {}  {}", style("Modality:").bold(), modality);
    println!("  {}  {}", style("Indexed:").bold(), style(report.success_count()).green());
    println!("  {}  {}", style("Failed:").bold(), report.failure_count());
    println!("  {}  {}", style("Skipped:").bold(), report.skipped);
    println!("  {}  {}", style("Vectors:").bold(), vectors);
    println!(
        "  {}  {}",
        style("Snapshot:").bold(),
        style(snapshot.display()).dim()
    );

    if !report.failures.is_empty() {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Document").fg(Color::White),
            Cell::new("Kind").fg(Color::White),
            Cell::new("Message").fg(Color::White),
        ]);

        for failure in &report.failures {
            let kind_cell = match failure.kind {
                FailureKind::MissingField => Cell::new(failure.kind).fg(Color::Yellow),
                _ => Cell::new(failure.kind).fg(Color::Red),
            };
            table.add_row(vec![
                Cell::new(failure.document_id.as_str()).fg(Color::Cyan),
                kind_cell,
                Cell::new(truncate(&failure.message, MAX_MESSAGE_WIDTH)),
            ]);
        }

        println!();
        println!("{table}");
    }
    println!();

    Ok(())
}

fn truncate(message: &str, max: usize) -> String {
    if message.chars().count() <= max {
        return message.to_string();
    }
    let kept: String = message.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
