//! Configuration module
//!
//! Combines global CLI flags with the tailer settings read from the
//! environment.

use anyhow::{Context, Result};
use berth_stream::TailerConfig;
use tracing::debug;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Emit JSON instead of formatted text
    pub json: bool,

    /// Tailer timings (BERTH_* environment variables)
    pub tailer: TailerConfig,
}

impl Config {
    /// Loads the tailer configuration from the environment and validates it
    pub fn load(json: bool) -> Result<Self> {
        let tailer = TailerConfig::from_env();
        tailer
            .validate()
            .context("Invalid tailer configuration in environment")?;

        debug!("Loaded tailer configuration: {:?}", tailer);

        Ok(Self { json, tailer })
    }
}
