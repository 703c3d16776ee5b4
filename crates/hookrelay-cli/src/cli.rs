use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hookrelay")]
#[command(about = "Replay MySQL binlog events into another MySQL database through transform hooks")]
#[command(version)]
pub struct Cli {
    /// Path to hookrelay.toml config file
    #[arg(short, long, global = true, default_value = "hookrelay.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start replicating
    Start {
        /// Disable foreign key checks on the destination while running
        #[arg(long)]
        force: bool,
    },

    /// Run the full pipeline but log statements instead of executing them
    Dryrun,

    /// Show the resolved table configuration and exit
    Tables,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_start_force() {
        let cli = Cli::try_parse_from(["hookrelay", "start", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Start { force: true }));
        assert_eq!(cli.config, PathBuf::from("hookrelay.toml"));
    }

    #[test]
    fn test_parse_config_after_subcommand() {
        let cli = Cli::try_parse_from(["hookrelay", "dryrun", "--config", "/etc/relay.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Dryrun));
        assert_eq!(cli.config, PathBuf::from("/etc/relay.toml"));
    }
}
