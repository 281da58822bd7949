//! Berth Stream
//!
//! Decodes a container engine's multiplexed attach stream and tails it into
//! a build log.
//!
//! This crate contains:
//! - Demultiplexer: typed frames from any `AsyncRead` transport
//! - Sinks: append-only log targets that report whether they are live
//! - Tailer: the background worker that polls the stream into a sink
//! - Text: lossy UTF-8 decoding that keeps characters split across frames
//! - Configuration: polling and release timings

pub mod build;
pub mod config;
pub mod demux;
pub mod error;
pub mod sink;
pub mod tailer;
pub mod text;

pub use build::{AlwaysRunning, BuildStatus, MarkerFile};
pub use config::TailerConfig;
pub use demux::FrameDemultiplexer;
pub use error::{ConfigError, DemuxError, TailError};
pub use sink::{FileLogSink, LogSink, LogSnapshot, LogStatus, MemoryLogSink, read_log};
pub use tailer::{Phase, StopReason, StreamTailer, TailSummary, TailerHandle};
pub use text::TextDecoder;
