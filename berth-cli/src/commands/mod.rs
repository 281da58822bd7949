//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod parse;
mod stream;

pub use parse::ParseCommands;
pub use stream::StreamCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Parse container configuration text
    Parse {
        #[command(subcommand)]
        command: ParseCommands,
    },
    /// Decode and tail attach streams
    Stream {
        #[command(subcommand)]
        command: StreamCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Parse { command } => parse::handle_parse_command(command, config).await,
        Commands::Stream { command } => stream::handle_stream_command(command, config).await,
    }
}
