//! xtract CLI: serve and query the paper search and recommendation API.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use xtract_core::SearchMode;

/// xtract: research paper search and recommendations
#[derive(Parser, Debug)]
#[command(name = "xtract", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (where `xtract.toml` is looked up)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Start the HTTP API
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Path to the corpus CSV
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Load the vector index and enable recommendations
        #[arg(long)]
        index: bool,
    },
    /// Print one paper by identifier
    Paper {
        /// Paper identifier
        id: String,
    },
    /// Search the corpus
    Search {
        /// Query text
        query: String,
        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// keyword or semantic
        #[arg(short, long)]
        mode: Option<SearchMode>,
    },
    /// Recommend papers similar to one paper
    Recommend {
        /// Paper identifier
        id: String,
        /// Number of recommendations
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Write a default `xtract.toml` into the workspace
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "xtract", "xtract")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "xtract.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    // Resolve workspace
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from(["xtract", "search", "graph", "-k", "5", "--mode", "semantic"])
            .unwrap();
        match cli.command {
            Commands::Search {
                query,
                top_k,
                mode,
            } => {
                assert_eq!(query, "graph");
                assert_eq!(top_k, Some(5));
                assert_eq!(mode, Some(SearchMode::Semantic));
            }
            other => panic!("Expected Search, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["xtract", "paper", "1001", "-vv", "--config", "x.toml"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["xtract", "search", "graph", "--mode", "fuzzy"]).is_err());
    }

    #[test]
    fn test_cli_serve_overrides() {
        let cli = Cli::try_parse_from([
            "xtract", "serve", "--host", "0.0.0.0", "-p", "9000", "--index",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve {
                host, port, index, ..
            } => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9000));
                assert!(index);
            }
            other => panic!("Expected Serve, got {:?}", other),
        }
    }
}
