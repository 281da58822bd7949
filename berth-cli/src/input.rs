//! Input helpers
//!
//! Grammar commands take their text inline, from a file (`@path`) or from
//! stdin (`-`).

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

/// Resolves a command argument to the configuration text it names
pub async fn read_text(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read configuration from stdin")?;
        return Ok(text);
    }

    if let Some(path) = arg.strip_prefix('@') {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration file: {}", path));
    }

    Ok(arg.to_string())
}

/// Like [`read_text`], treating a missing argument as empty input
pub async fn read_optional(arg: Option<&str>) -> Result<String> {
    match arg {
        Some(arg) => read_text(arg).await,
        None => Ok(String::new()),
    }
}
