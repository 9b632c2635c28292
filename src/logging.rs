//! Logging setup
//!
//! Console output plus an optional non-blocking log file:
//! - Filter from `RUST_LOG`, else the configured level
//! - File writer appends to `<directory>/<file>`
//! - JSON lines instead of the human format when `json` is set

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use pulsecheck_core::LoggingSettings;

/// Keeps the file writer alive; dropping it flushes the log file
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Filter from `RUST_LOG`, falling back to `level`
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> io::Result<LoggingGuard> {
    let (file_layer, file_guard) = match &settings.directory {
        Some(directory) => {
            fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::never(directory, Path::new(&settings.file));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = if settings.json {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .boxed()
            } else {
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .boxed()
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stdout_layer = if settings.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stdout)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_target(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter(&settings.level))
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
