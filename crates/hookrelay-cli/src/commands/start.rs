use std::process::ExitCode;

use anyhow::Result;
use tracing::info;

use hookrelay_config::ProjectConfig;

use crate::runner::{run_replication, Mode};

pub async fn cmd_start(config: ProjectConfig, force: bool) -> Result<ExitCode> {
    info!(force, "Starting hookrelay replication");
    run_replication(&config, Mode::Live { force }).await
}

pub async fn cmd_dryrun(config: ProjectConfig) -> Result<ExitCode> {
    info!("Starting hookrelay dry run; no statements will be executed");
    run_replication(&config, Mode::DryRun).await
}
