//! CLI module
//!
//! Provides:
//! - Argument parsing (clap)
//! - Configuration resolution (flag → default path → demo for dry runs)
//! - Command dispatch

pub mod args;
pub mod dispatch;

pub use args::{Cli, Command};
pub use dispatch::{exit_code_for, resolve_config, run_cli, ExitCode};

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;
