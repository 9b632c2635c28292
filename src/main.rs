//! Pulsecheck CLI
//!
//! Commands:
//! - run [--dry-run]        collect, analyze and deliver once
//! - schedule [--dry-run]   run now, then daily at the configured time
//! - check-config           validate the configuration
//! - init-config [--force]  write the demo configuration
//! - sources                list collector kinds, channel kinds and providers

use clap::Parser;

use pulsecheck::cli::{run_cli, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = run_cli(cli).await;
    std::process::exit(code);
}
