//! Stream command handlers
//!
//! Decodes captured attach streams and tails live ones into build logs.

use anyhow::{Context, Result};
use berth_core::domain::StreamType;
use berth_stream::{
    BuildStatus, FileLogSink, FrameDemultiplexer, MarkerFile, StopReason, StreamTailer,
    TailSummary, TextDecoder, read_log,
};
use clap::Subcommand;
use colored::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncRead;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;

/// Stream subcommands
#[derive(Subcommand)]
pub enum StreamCommands {
    /// Decode a captured raw attach stream
    Demux {
        /// File holding the raw stream
        file: PathBuf,

        /// Print per-stream totals instead of the frames
        #[arg(short, long)]
        summary: bool,
    },
    /// Tail an attach stream into a build log
    Tail {
        /// File or FIFO carrying the stream, or `-` for stdin
        source: String,

        /// Log file to append to
        #[arg(short, long, env = "BERTH_LOG")]
        log: PathBuf,

        /// Stop once this file no longer exists (the build's running marker)
        #[arg(long)]
        while_exists: Option<PathBuf>,

        /// Override the poll interval, in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },
    /// Report whether a log is still live or finalized
    LogStatus {
        /// Log file
        log: PathBuf,
    },
}

/// Handle stream commands
///
/// # Arguments
/// * `command` - The stream command to execute
/// * `config` - The CLI configuration
pub async fn handle_stream_command(command: StreamCommands, config: &Config) -> Result<()> {
    match command {
        StreamCommands::Demux { file, summary } => demux(&file, summary, config).await,
        StreamCommands::Tail {
            source,
            log,
            while_exists,
            poll_interval_ms,
        } => tail(&source, &log, while_exists, poll_interval_ms, config).await,
        StreamCommands::LogStatus { log } => status(&log, config).await,
    }
}

#[derive(Serialize)]
struct FrameRecord {
    stream: StreamType,
    text: String,
}

#[derive(Default, Serialize)]
struct StreamTotals {
    frames: u64,
    bytes: u64,
}

/// Decode every frame of a captured stream
///
/// Frames decoded before a protocol error are still printed.
async fn demux(file: &Path, summary: bool, config: &Config) -> Result<()> {
    let transport = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("Failed to open stream capture: {}", file.display()))?;
    let mut demux = FrameDemultiplexer::new(transport);
    let mut decoder = TextDecoder::new();

    let mut records = Vec::new();
    let mut totals: BTreeMap<String, StreamTotals> = BTreeMap::new();

    let outcome = loop {
        match demux.next_frame().await {
            Ok(Some(frame)) => {
                let entry = totals.entry(frame.stream_type.to_string()).or_default();
                entry.frames += 1;
                entry.bytes += frame.payload.len() as u64;

                if summary {
                    continue;
                }
                let text = decoder.decode(&frame);
                if config.json {
                    records.push(FrameRecord {
                        stream: frame.stream_type,
                        text,
                    });
                } else {
                    print_frame(frame.stream_type, &text);
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    for stream_type in [StreamType::Stdin, StreamType::Stdout, StreamType::Stderr] {
        let text = decoder.finish(stream_type);
        if text.is_empty() || summary {
            continue;
        }
        if config.json {
            records.push(FrameRecord {
                stream: stream_type,
                text,
            });
        } else {
            print_frame(stream_type, &text);
        }
    }

    if summary {
        if config.json {
            println!("{}", serde_json::to_string_pretty(&totals)?);
        } else {
            print_totals(&totals);
        }
    } else if config.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    }

    outcome.with_context(|| format!("Stream capture {} is corrupt", file.display()))
}

/// Tail a stream into a log until it ends, the build marker disappears,
/// or Ctrl-C
async fn tail(
    source: &str,
    log: &Path,
    while_exists: Option<PathBuf>,
    poll_interval_ms: Option<u64>,
    config: &Config,
) -> Result<()> {
    let mut tailer_config = config.tailer.clone();
    if let Some(ms) = poll_interval_ms {
        tailer_config = tailer_config.with_poll_interval(Duration::from_millis(ms));
        tailer_config
            .validate()
            .context("Invalid --poll-interval-ms")?;
    }

    let transport = open_source(source).await?;

    let attachment = Uuid::new_v4();
    let sink = FileLogSink::open(log, attachment, tailer_config.live_marker)
        .await
        .with_context(|| format!("Failed to open log: {}", log.display()))?;

    let marker = while_exists.map(MarkerFile::new);
    let build = move || marker.as_ref().is_none_or(|m| m.is_running());

    let mut handle = StreamTailer::new(transport, sink, build, tailer_config)
        .with_id(attachment)
        .start();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Interrupt received, stopping tailer");
        }
        _ = handle.stopped() => {}
    }

    let summary = handle.stop().await.context("Tailer did not shut down cleanly")?;

    if config.json {
        println!(
            "{}",
            serde_json::json!({
                "attachment": summary.attachment.to_string(),
                "frames": summary.frames,
                "bytes": summary.bytes,
                "stop_reason": summary.stop_reason.to_string(),
                "log": log.display().to_string(),
            })
        );
    } else {
        print_summary(&summary, log);
    }

    if let StopReason::Failed(reason) = summary.stop_reason {
        anyhow::bail!("Tailing stopped early: {}", reason);
    }
    Ok(())
}

/// Opens the tail transport
///
/// FIFOs are opened as non-blocking pipes so a stop can abandon a read that
/// is still waiting on the writer. Regular files and stdin are read through
/// the blocking pool.
async fn open_source(source: &str) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    if source == "-" {
        return Ok(Box::new(tokio::io::stdin()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;

        let metadata = tokio::fs::metadata(source)
            .await
            .with_context(|| format!("Failed to open stream source: {}", source))?;
        if metadata.file_type().is_fifo() {
            let receiver = tokio::net::unix::pipe::OpenOptions::new()
                .open_receiver(source)
                .with_context(|| format!("Failed to open FIFO: {}", source))?;
            return Ok(Box::new(receiver));
        }
    }

    let file = tokio::fs::File::open(source)
        .await
        .with_context(|| format!("Failed to open stream source: {}", source))?;
    Ok(Box::new(file))
}

#[derive(Serialize)]
struct LogStatusRecord {
    log: String,
    live: bool,
    bytes: usize,
    lines: usize,
}

/// Report log liveness
async fn status(log: &Path, config: &Config) -> Result<()> {
    let snapshot = read_log(log)
        .await
        .with_context(|| format!("Failed to read log: {}", log.display()))?;

    let record = LogStatusRecord {
        log: log.display().to_string(),
        live: snapshot.live,
        bytes: snapshot.text.len(),
        lines: snapshot.text.lines().count(),
    };

    if config.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let state = if record.live {
        "live".green().bold()
    } else {
        "finalized".dimmed()
    };
    println!("  {} {}", "▸".cyan(), record.log.bold());
    println!("    Status:  {}", state);
    println!("    Size:    {} byte(s), {} line(s)", record.bytes, record.lines);
    Ok(())
}

fn print_frame(stream_type: StreamType, text: &str) {
    let label = match stream_type {
        StreamType::Stdin => "stdin ".blue(),
        StreamType::Stdout => "stdout".green(),
        StreamType::Stderr => "stderr".red(),
    };
    for line in text.lines() {
        println!("{} {}", label, line);
    }
}

fn print_totals(totals: &BTreeMap<String, StreamTotals>) {
    if totals.is_empty() {
        println!("{}", "Stream is empty.".yellow());
        return;
    }

    for (stream, total) in totals {
        println!(
            "  {} {:<6} {} frame(s), {} byte(s)",
            "▸".cyan(),
            stream.bold(),
            total.frames,
            total.bytes
        );
    }
}

fn print_summary(summary: &TailSummary, log: &Path) {
    let reason = match &summary.stop_reason {
        StopReason::Failed(_) => summary.stop_reason.to_string().red(),
        other => other.to_string().green(),
    };

    println!("{}", format!("Tailer {} stopped", summary.attachment).bold());
    println!("    Reason:  {}", reason);
    println!(
        "    Output:  {} frame(s), {} byte(s)",
        summary.frames, summary.bytes
    );
    println!("    Log:     {}", log.display().to_string().dimmed());
}
