//! Berth CLI
//!
//! Command-line interface for the Berth build-step tooling: parse container
//! configuration text, decode captured attach streams and tail a live
//! stream into a build log.

mod commands;
mod config;
mod input;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "berth")]
#[command(about = "Berth container build-step tooling", long_about = None)]
struct Cli {
    /// Print machine-readable JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// How long shutdown waits on blocking-pool reads, such as stdin
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "berth_cli=info,berth_stream=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.json)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(handle_command(cli.command, &config));

    // A read parked on a silent writer cannot be cancelled; don't wait for it
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}
