//! CLI argument parsing
//!
//! Commands: run, schedule, check-config, init-config, sources.
//! Global option: --config <path>.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Daily platform health reporter
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "pulsecheck", version)]
pub struct Cli {
    /// Configuration file (toml, json or yaml); defaults to the user config dir
    #[arg(long, short, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Collect, analyze and deliver one report
    Run {
        /// Use synthetic data instead of the real collectors
        #[arg(long)]
        dry_run: bool,
    },

    /// Run now, then daily at the configured time
    Schedule {
        /// Use synthetic data instead of the real collectors
        #[arg(long)]
        dry_run: bool,
    },

    /// Load and validate the configuration
    CheckConfig,

    /// Write the demo configuration to the config path
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List collector kinds, channel kinds and analyzer providers
    Sources,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("pulsecheck").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_run() {
        let cli = parse(&["run"]).unwrap();
        assert_eq!(cli.command, Command::Run { dry_run: false });
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_dry_run_with_config_after_command() {
        let cli = parse(&["run", "--dry-run", "--config", "/etc/pulsecheck.yaml"]).unwrap();
        assert_eq!(cli.command, Command::Run { dry_run: true });
        assert_eq!(cli.config, Some(PathBuf::from("/etc/pulsecheck.yaml")));
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(parse(&["schedule"]).unwrap().command, Command::Schedule { dry_run: false });
        assert_eq!(parse(&["check-config"]).unwrap().command, Command::CheckConfig);
        assert_eq!(parse(&["init-config", "--force"]).unwrap().command, Command::InitConfig { force: true });
        assert_eq!(parse(&["sources"]).unwrap().command, Command::Sources);
    }

    #[test]
    fn test_command_is_required() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["explode"]).is_err());
    }
}
