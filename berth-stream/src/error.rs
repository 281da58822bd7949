//! Error types for stream decoding and tailing

use thiserror::Error;

/// Result type alias for demultiplexer operations
pub type Result<T> = std::result::Result<T, DemuxError>;

/// Errors raised while decoding the attach stream
///
/// Protocol variants are fatal to the current decode; the demultiplexer
/// returns end of stream afterwards.
#[derive(Debug, Error)]
pub enum DemuxError {
    /// Stream ended after 1 to 7 header bytes
    #[error("stream ended inside a frame header ({available} of 8 bytes)")]
    TruncatedHeader { available: usize },

    /// Stream ended before the declared payload was complete
    #[error("stream ended inside a frame payload ({available} of {expected} bytes)")]
    TruncatedPayload { expected: u32, available: usize },

    /// Header names a stream other than stdin, stdout or stderr
    #[error("invalid stream type {0}")]
    InvalidStreamType(u8),

    /// Transport read failed
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl DemuxError {
    /// Whether this is a framing violation rather than a transport failure
    pub fn is_protocol(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Errors surfaced by a tailer
#[derive(Debug, Error)]
pub enum TailError {
    #[error("decode failed: {0}")]
    Demux(#[from] DemuxError),

    #[error("log sink failed: {0}")]
    Sink(#[source] std::io::Error),

    /// The worker task panicked or was aborted
    #[error("tailer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Invalid tailer configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than 0")]
    ZeroDuration { field: &'static str },

    #[error("drain_idle ({drain_idle_ms} ms) must be shorter than poll_interval ({poll_interval_ms} ms)")]
    DrainIdleTooLong {
        drain_idle_ms: u128,
        poll_interval_ms: u128,
    },
}
