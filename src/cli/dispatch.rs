//! CLI command dispatch
//!
//! Resolves the configuration, installs logging and hands off to the
//! pipeline or scheduler. Returns a process exit code:
//! - 0: run finished (whatever the platform status)
//! - 1: no channel accepted the report, or an unexpected error
//! - 2: configuration error; nothing was collected

use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pulsecheck_agents::{FactoryError, KNOWN_PROVIDERS};
use pulsecheck_collectors::{CollectorRegistry, RegistryError};
use pulsecheck_core::{AggregateError, AppConfig, ConfigError, ConfigManager};

use crate::cli::{Cli, Command, EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
use crate::delivery::{ChannelRegistry, ChannelRegistryError};
use crate::logging::{init_logging, LoggingGuard};
use crate::pipeline::Pipeline;
use crate::scheduler::run_daily;

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

/// Map an error to its exit code
pub fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    let is_config = error.downcast_ref::<ConfigError>().is_some()
        || error.downcast_ref::<RegistryError>().is_some()
        || error.downcast_ref::<ChannelRegistryError>().is_some()
        || error.downcast_ref::<FactoryError>().is_some()
        || error.downcast_ref::<AggregateError>().is_some();
    if is_config {
        EXIT_CONFIG_ERROR
    } else {
        EXIT_FAILURE
    }
}

/// Load the configuration for a command
///
/// Uses `explicit` or the default path. When no file exists and
/// `allow_demo` is set, the built-in demo configuration is used instead.
pub fn resolve_config(explicit: Option<&Path>, allow_demo: bool) -> anyhow::Result<AppConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => ConfigManager::default_path()?,
    };

    if !path.exists() && allow_demo {
        let mut config = AppConfig::demo();
        config.apply_env_overrides();
        return Ok(config);
    }

    let manager = ConfigManager::load(&path).with_context(|| {
        format!(
            "Could not load configuration from {} (create one with `pulsecheck init-config`)",
            path.display()
        )
    })?;
    Ok(manager.into_config())
}

/// Run the parsed command and return the process exit code
pub async fn run_cli(cli: Cli) -> ExitCode {
    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Sources => {
            print_sources();
            Ok(EXIT_SUCCESS)
        }
        Command::InitConfig { force } => init_config(config_path, force),
        Command::CheckConfig => check_config(config_path),
        Command::Run { dry_run } => {
            let config = resolve_config(config_path, dry_run)?;
            let _guard = start_logging(&config);
            let pipeline = Pipeline::new(config)?;
            let report = pipeline.run_once(dry_run).await?;
            if report.all_deliveries_failed() {
                return Ok(EXIT_FAILURE);
            }
            Ok(EXIT_SUCCESS)
        }
        Command::Schedule { dry_run } => {
            let config = resolve_config(config_path, dry_run)?;
            let _guard = start_logging(&config);
            let at = config.schedule.parse_time()?;
            let pipeline = Pipeline::new(config)?;

            let shutdown = CancellationToken::new();
            let trigger = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, stopping scheduler");
                    trigger.cancel();
                }
            });

            run_daily(&pipeline, at, dry_run, shutdown).await?;
            Ok(EXIT_SUCCESS)
        }
    }
}

fn start_logging(config: &AppConfig) -> LoggingGuard {
    match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: file logging unavailable: {}", e);
            LoggingGuard::default()
        }
    }
}

fn print_sources() {
    let collectors = CollectorRegistry::default();
    let channels = ChannelRegistry::default();
    println!("Collector kinds:");
    for kind in collectors.kinds() {
        println!("  {}", kind);
    }
    println!("Channel kinds:");
    for kind in channels.kinds() {
        println!("  {}", kind);
    }
    println!("Analyzer providers:");
    for provider in KNOWN_PROVIDERS {
        println!("  {}", provider);
    }
}

fn config_path_or_default(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(ConfigManager::default_path()?),
    }
}

fn init_config(explicit: Option<&Path>, force: bool) -> anyhow::Result<ExitCode> {
    let path = config_path_or_default(explicit)?;
    let manager = ConfigManager::with_config(&path, AppConfig::demo())?;
    if manager.config_exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    manager.save()?;
    println!(
        "Wrote demo configuration ({}) to {}",
        manager.config_format(),
        path.display()
    );
    Ok(EXIT_SUCCESS)
}

fn check_config(explicit: Option<&Path>) -> anyhow::Result<ExitCode> {
    let config = resolve_config(explicit, false)?;
    let pipeline = Pipeline::new(config)?;
    let config = pipeline.config();

    if config.channels.is_empty() {
        warn!("No channels configured");
        println!("Warning: no delivery channels configured");
    }
    let required = config.sources.iter().filter(|s| s.required).count();
    println!(
        "Configuration OK: {} source(s) ({} required), {} channel(s), analyzer '{}', daily at {}",
        config.sources.len(),
        required,
        config.channels.len(),
        config.analyzer.provider,
        config.schedule.time
    );
    Ok(EXIT_SUCCESS)
}
