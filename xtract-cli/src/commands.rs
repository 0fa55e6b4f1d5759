//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xtract_core::config::{load_config, AppConfig, WORKSPACE_CONFIG_FILE};
use xtract_core::{PaperService, SearchMode, XtractError};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            corpus,
            index,
        } => {
            let config = serve_config(workspace, config_file, host, port, corpus, index)?;
            handle_serve(config).await
        }
        Commands::Paper { id } => {
            let service = open(load(workspace, config_file, |_| {})?).await?;
            let paper = service.get_paper(&id).map_err(XtractError::from)?;
            print_json(&paper)?;
            Ok(())
        }
        Commands::Search { query, top_k, mode } => {
            let config = load(workspace, config_file, |config| {
                if mode == Some(SearchMode::Semantic) {
                    config.index.enabled = true;
                }
            })?;
            let service = open(config).await?;
            let results = service
                .search(&query, top_k, mode)
                .await
                .map_err(XtractError::from)?;
            print_json(&results)?;
            Ok(())
        }
        Commands::Recommend { id, top_k } => {
            let config = load(workspace, config_file, |config| config.index.enabled = true)?;
            let service = open(config).await?;
            let results = service
                .recommend(&id, top_k)
                .await
                .map_err(XtractError::from)?;
            print_json(&results)?;
            Ok(())
        }
        Commands::Config { action } => handle_config(action, workspace, config_file).await,
    }
}

/// Layer the config files, apply command-line overrides, then validate the
/// result.
fn load(
    workspace: &Path,
    config_file: Option<&Path>,
    overrides: impl FnOnce(&mut AppConfig),
) -> xtract_core::Result<AppConfig> {
    let mut config = load_config(Some(workspace), config_file, None)?;
    overrides(&mut config);
    Ok(config.validated()?)
}

fn serve_config(
    workspace: &Path,
    config_file: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    corpus: Option<PathBuf>,
    index: bool,
) -> xtract_core::Result<AppConfig> {
    load(workspace, config_file, |config| {
        if let Some(host) = host {
            config.server.host = host;
        }
        if let Some(port) = port {
            config.server.port = port;
        }
        if let Some(corpus) = corpus {
            config.corpus.path = corpus;
        }
        if index {
            config.index.enabled = true;
        }
    })
}

async fn open(config: AppConfig) -> xtract_core::Result<PaperService> {
    Ok(PaperService::from_config(config).await?)
}

fn print_json<T: Serialize>(value: &T) -> xtract_core::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

async fn handle_serve(config: AppConfig) -> anyhow::Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let service = Arc::new(open(config).await?);
    if !service.has_similarity() {
        tracing::warn!("Vector index disabled; /recommend will return 500");
    }
    tracing::info!(host = %host, port, records = service.len(), "Starting xtract API");
    xtract_core::gateway::run(service, &host, port).await?;
    Ok(())
}

async fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace.join(WORKSPACE_CONFIG_FILE);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&AppConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), config_file, None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            for problem in config.validate() {
                eprintln!("warning: {}", problem);
            }
            Ok(())
        }
    }
}
