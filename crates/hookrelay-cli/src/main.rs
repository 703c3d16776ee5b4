use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

mod cli;
mod commands;
mod env;
mod runner;

use cli::{Cli, Commands};
use hookrelay_config::ProjectConfig;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hookrelay=info".parse()?),
        )
        .init();

    // Load .env file if present
    if env::load_dotenv_from_ancestors()?.is_none() {
        debug!("No .env file found");
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { force } => {
            let config = load_config(&cli.config)?;
            commands::cmd_start(config, force).await
        }
        Commands::Dryrun => {
            let config = load_config(&cli.config)?;
            commands::cmd_dryrun(config).await
        }
        Commands::Tables => {
            let config = load_config(&cli.config)?;
            commands::cmd_tables(config).await
        }
    }
}

fn load_config(path: &Path) -> Result<ProjectConfig> {
    ProjectConfig::load(path)
        .with_context(|| format!("Failed to load config file: {}", path.display()))
}
