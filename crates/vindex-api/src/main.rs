//! vindex CLI and REST API entry point.
//!
//! Binary name: `vindex`
//!
//! Parses CLI arguments, sets up tracing, loads configuration, then
//! dispatches to the command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::{AppState, BuildOverrides};
use vindex_observe::tracing_setup::{init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,vindex_core=debug,vindex_infra=debug,vindex_api=debug",
        _ => "trace",
    };
    init_tracing(cli.otel, filter)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "vindex", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Build {
            name,
            dir,
            modality,
            batch_size,
            concurrency,
        } => {
            let overrides = BuildOverrides {
                batch_size,
                concurrency,
            };
            cli::build::build_index(
                &state,
                &name,
                &dir,
                modality.into(),
                overrides,
                cli.json,
                cli.quiet,
            )
            .await?;
        }

        Commands::Search {
            name,
            query,
            k,
            using,
        } => {
            cli::search::search(&state, &name, &query, k, using.into(), cli.json, cli.quiet)
                .await?;
        }

        Commands::Watch {
            name,
            dir,
            modality,
            batch_size,
            debounce_ms,
        } => {
            cli::watch::watch(
                &state,
                &name,
                &dir,
                modality.into(),
                batch_size,
                Duration::from_millis(debounce_ms),
                cli.json,
                cli.quiet,
            )
            .await?;
        }

        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
        }

        Commands::Serve { port, host } => {
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("cannot bind {addr}"))?;

            println!();
            println!(
                "  {} vindex API listening on {}",
                console::style("▶").green().bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!(
                "  {} {}",
                console::style("Indexes:").bold(),
                console::style(format!("http://{addr}/api/v1/indexes")).dim()
            );
            println!();

            let app = http::router::build_router(state);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
