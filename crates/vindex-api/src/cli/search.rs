//! `vindex search`: query a saved index with text or an image file.

use anyhow::Context;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets};
use console::style;
use tracing::Instrument;

use vindex_infra::config::resolve_k;
use vindex_observe::attrs;
use vindex_types::document::FieldValue;
use vindex_types::embedding::Modality;

use crate::cli::build::spinner;
use crate::state::AppState;

/// Run one query against `name`, embedding it with the `using` tower.
pub async fn search(
    state: &AppState,
    name: &str,
    query: &str,
    k: Option<usize>,
    using: Modality,
    json: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let value = match using {
        Modality::Text => FieldValue::Text(query.to_string()),
        Modality::Image => FieldValue::Blob(
            tokio::fs::read(query)
                .await
                .with_context(|| format!("cannot read query image {query}"))?,
        ),
    };

    state
        .open_index(name)
        .await
        .with_context(|| format!("cannot open index '{name}'"))?;

    let k = resolve_k(&state.config, k);
    let listener = AppState::listener_id(name, using);
    let progress = spinner(json || quiet, "Searching...".to_string())?;

    let span = tracing::info_span!(
        "vindex.search",
        { attrs::OPERATION_NAME } = attrs::OP_SEARCH,
        { attrs::INDEX_NAME } = name,
        { attrs::LISTENER_ID } = %listener,
        { attrs::QUERY_K } = k,
        { attrs::QUERY_KIND } = value.kind(),
    );
    let hits = state
        .catalog
        .search(&value, name, Some(&listener), k)
        .instrument(span)
        .await;
    progress.finish_and_clear();
    let hits = hits?;

    if json {
        let out = serde_json::json!({
            "index": name,
            "using": listener,
            "k": k,
            "hits": hits,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!();
        println!(
            "  {} Index '{}' is empty. Rebuild it with: {}",
            style("i").blue().bold(),
            name,
            style(format!("vindex build {name} --dir <DIR>")).yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Document").fg(Color::White),
        Cell::new("Distance").fg(Color::White),
    ]);

    for (rank, hit) in hits.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1).fg(Color::DarkGrey),
            Cell::new(hit.document_id.as_str()).fg(Color::Cyan),
            Cell::new(format!("{:.4}", hit.distance)).set_alignment(CellAlignment::Right),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} result{} from '{}' via {}",
        style(hits.len()).bold(),
        if hits.len() == 1 { "" } else { "s" },
        name,
        style(&listener).dim()
    );
    println!();

    Ok(())
}
