//! CLI command definitions and dispatch for the `vindex` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod build;
pub mod search;
pub mod status;
pub mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use vindex_types::embedding::Modality;

/// Build and query multimodal vector indexes over local files.
#[derive(Parser)]
#[command(name = "vindex", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which CLIP tower reads documents or embeds a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModalityArg {
    Image,
    Text,
}

impl From<ModalityArg> for Modality {
    fn from(arg: ModalityArg) -> Self {
        match arg {
            ModalityArg::Image => Modality::Image,
            ModalityArg::Text => Modality::Text,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Embed every document in a directory and save the index.
    Build {
        /// Index name.
        name: String,

        /// Directory holding the documents.
        #[arg(long)]
        dir: PathBuf,

        /// Which field the index embeds (image files or text files).
        #[arg(long, value_enum, default_value_t = ModalityArg::Image)]
        modality: ModalityArg,

        /// Documents per inference call (defaults to the configured value).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Inference batches in flight at once.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Query a saved index.
    Search {
        /// Index name.
        name: String,

        /// Query text, or a path to an image file with `--using image`.
        query: String,

        /// Number of results (defaults to the configured value).
        #[arg(short, long)]
        k: Option<usize>,

        /// Tower used to embed the query.
        #[arg(long, value_enum, default_value_t = ModalityArg::Text)]
        using: ModalityArg,
    },

    /// Build an index, then keep it current as files change.
    Watch {
        /// Index name.
        name: String,

        /// Directory holding the documents.
        #[arg(long)]
        dir: PathBuf,

        /// Which field the index embeds.
        #[arg(long, value_enum, default_value_t = ModalityArg::Image)]
        modality: ModalityArg,

        /// Documents per inference call.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Filesystem debounce window in milliseconds.
        #[arg(long, default_value_t = 500)]
        debounce_ms: u64,
    },

    /// Show configuration and saved indexes.
    Status,

    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value_t = 3000)]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_defaults_to_the_text_tower() {
        let cli = Cli::try_parse_from(["vindex", "search", "photos", "a red car"]).unwrap();

        match cli.command {
            Commands::Search { name, query, k, using } => {
                assert_eq!(name, "photos");
                assert_eq!(query, "a red car");
                assert_eq!(k, None);
                assert_eq!(Modality::from(using), Modality::Text);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn build_accepts_overrides_and_global_flags() {
        let cli = Cli::try_parse_from([
            "vindex",
            "build",
            "notes",
            "--dir",
            "/tmp/notes",
            "--modality",
            "text",
            "--batch-size",
            "4",
            "--json",
            "-vv",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Build {
                modality,
                batch_size,
                concurrency,
                ..
            } => {
                assert_eq!(modality, ModalityArg::Text);
                assert_eq!(batch_size, Some(4));
                assert_eq!(concurrency, None);
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn build_requires_a_directory() {
        assert!(Cli::try_parse_from(["vindex", "build", "notes"]).is_err());
    }
}
