//! System status command.

use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets};
use console::style;

use crate::state::AppState;

/// Display configuration and every saved index.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let indexes = state.index_summaries().await?;
    let config = state.config.as_ref();

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "config": config,
            "indexes": indexes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} vindex v{}", style("◆").cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Config ──").dim());
    println!("  Metric:        {}", config.metric);
    println!("  Empty store:   {}", config.empty_store_policy);
    println!("  Default k:     {}", config.default_k);
    println!("  Batch size:    {}", config.batch_size);
    println!("  Concurrency:   {}", config.max_concurrent_batches);
    if config.inference_timeout_secs > 0 {
        println!("  Timeout:       {}s", config.inference_timeout_secs);
    } else {
        println!("  Timeout:       {}", style("none").dim());
    }
    println!();

    println!("  {}", style("── Indexes ──").dim());
    if indexes.is_empty() {
        println!(
            "  None yet. Create one with: {}",
            style("vindex build <NAME> --dir <DIR>").yellow()
        );
    } else {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Name").fg(Color::White),
            Cell::new("Modality").fg(Color::White),
            Cell::new("Vectors").fg(Color::White),
            Cell::new("Space").fg(Color::White),
            Cell::new("Metric").fg(Color::White),
            Cell::new("Built").fg(Color::White),
        ]);

        for index in &indexes {
            table.add_row(vec![
                Cell::new(&index.name).fg(Color::Cyan),
                Cell::new(index.modality),
                Cell::new(index.vector_count).set_alignment(CellAlignment::Right),
                Cell::new(&index.space),
                Cell::new(index.metric),
                Cell::new(index.created_at.format("%Y-%m-%d %H:%M")).fg(Color::DarkGrey),
            ]);
        }
        println!("{table}");
    }
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!();

    Ok(())
}
