//! Parse command handlers
//!
//! Parses bind mount, port binding and link text the same way the
//! container-creation request builder does, and prints the records.

use anyhow::{Context, Result};
use berth_core::domain::{AccessMode, BindSpec, LinkSpec, PortBindings};
use berth_core::dto::{HostConfig, exposed_ports};
use berth_core::parser::{parse_binds, parse_links, parse_port_bindings};
use clap::Subcommand;
use colored::*;

use crate::config::Config;
use crate::input::{read_optional, read_text};

/// Parse subcommands
///
/// Every TEXT argument may be given inline, as `@file`, or as `-` for stdin.
#[derive(Subcommand)]
pub enum ParseCommands {
    /// Parse bind mounts, one `host:container[:ro|rw]` per line
    Binds {
        /// Bind mount text
        text: String,
    },
    /// Parse port bindings, one `[ip:][hostPort]:containerPort[/proto]` per line
    Ports {
        /// Port binding text
        text: String,
    },
    /// Parse comma-separated `name:alias` links
    Links {
        /// Link text
        text: String,
    },
    /// Build the engine HostConfig fragment from all three grammars
    HostConfig {
        /// Bind mount text
        #[arg(long)]
        binds: Option<String>,

        /// Port binding text
        #[arg(long)]
        ports: Option<String>,

        /// Link text
        #[arg(long)]
        links: Option<String>,
    },
}

/// Handle parse commands
///
/// # Arguments
/// * `command` - The parse command to execute
/// * `config` - The CLI configuration
pub async fn handle_parse_command(command: ParseCommands, config: &Config) -> Result<()> {
    match command {
        ParseCommands::Binds { text } => {
            let binds = parse_binds(&read_text(&text).await?)
                .context("Failed to parse bind mounts")?;
            if config.json {
                println!("{}", serde_json::to_string_pretty(&binds)?);
            } else {
                print_binds(&binds);
            }
            Ok(())
        }
        ParseCommands::Ports { text } => {
            let ports = parse_port_bindings(&read_text(&text).await?)
                .context("Failed to parse port bindings")?;
            if config.json {
                println!("{}", serde_json::to_string_pretty(&ports.to_specs())?);
            } else {
                print_ports(&ports);
            }
            Ok(())
        }
        ParseCommands::Links { text } => {
            let links =
                parse_links(&read_text(&text).await?).context("Failed to parse links")?;
            if config.json {
                println!("{}", serde_json::to_string_pretty(&links)?);
            } else {
                print_links(&links);
            }
            Ok(())
        }
        ParseCommands::HostConfig {
            binds,
            ports,
            links,
        } => host_config(binds, ports, links).await,
    }
}

/// Print the HostConfig fragment and the matching ExposedPorts set
///
/// Always JSON, since the output is meant for a request body.
async fn host_config(
    binds: Option<String>,
    ports: Option<String>,
    links: Option<String>,
) -> Result<()> {
    let binds = parse_binds(&read_optional(binds.as_deref()).await?)
        .context("Failed to parse bind mounts")?;
    let ports = parse_port_bindings(&read_optional(ports.as_deref()).await?)
        .context("Failed to parse port bindings")?;
    let links = parse_links(&read_optional(links.as_deref()).await?)
        .context("Failed to parse links")?;

    let body = serde_json::json!({
        "ExposedPorts": exposed_ports(&ports),
        "HostConfig": HostConfig::from_specs(&binds, &ports, &links),
    });

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn print_binds(binds: &[BindSpec]) {
    if binds.is_empty() {
        println!("{}", "No bind mounts.".yellow());
        return;
    }

    println!(
        "{}",
        format!("Parsed {} bind mount(s):", binds.len()).bold()
    );
    for bind in binds {
        let mode = match bind.access_mode {
            AccessMode::ReadOnly => "read-only".yellow(),
            AccessMode::ReadWrite => "read-write".green(),
            AccessMode::Default => "default".dimmed(),
        };
        println!(
            "  {} {} -> {} ({})",
            "▸".cyan(),
            bind.host_path.bold(),
            bind.container_path,
            mode
        );
    }
}

fn print_ports(ports: &PortBindings) {
    if ports.is_empty() {
        println!("{}", "No port bindings.".yellow());
        return;
    }

    println!(
        "{}",
        format!("Parsed {} port binding(s):", ports.len()).bold()
    );
    for (exposed, host) in ports.iter() {
        let host_port = if host.is_ephemeral() {
            "ephemeral".dimmed().to_string()
        } else {
            host.host_port.to_string()
        };
        let host_ip = host.host_ip.as_deref().unwrap_or("*");
        println!(
            "  {} {} <- {}:{}",
            "▸".cyan(),
            exposed.to_string().bold(),
            host_ip,
            host_port
        );
    }
}

fn print_links(links: &[LinkSpec]) {
    if links.is_empty() {
        println!("{}", "No links.".yellow());
        return;
    }

    println!("{}", format!("Parsed {} link(s):", links.len()).bold());
    for link in links {
        println!(
            "  {} {} as {}",
            "▸".cyan(),
            link.name.bold(),
            link.alias
        );
    }
}
