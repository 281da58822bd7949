//! Attach stream frame types
//!
//! A container engine multiplexes stdin, stdout and stderr onto a single
//! stream. Each frame carries an 8-byte header:
//! ```text
//! ┌──────────┬──────────┬──────────────┐
//! │ Type     │ Reserved │ Length       │
//! │ 1 byte   │ 3 bytes  │ uint32 BE    │
//! └──────────┴──────────┴──────────────┘
//! ```
//! followed by exactly `Length` payload bytes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Source of a frame's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Stdin = 0,
    Stdout = 1,
    Stderr = 2,
}

impl StreamType {
    /// Wire identifier of this stream
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for StreamType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StreamType::Stdin),
            1 => Ok(StreamType::Stdout),
            2 => Ok(StreamType::Stderr),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamType::Stdin => write!(f, "stdin"),
            StreamType::Stdout => write!(f, "stdout"),
            StreamType::Stderr => write!(f, "stderr"),
        }
    }
}

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub stream_type: StreamType,
    pub payload_length: u32,
}

impl FrameHeader {
    /// Decodes a header from its 8 wire bytes.
    ///
    /// Reserved bytes 1..4 are ignored. Returns the raw type byte as the
    /// error when it is not a known stream.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self, u8> {
        let stream_type = StreamType::try_from(buf[0])?;
        let payload_length = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);

        Ok(Self {
            stream_type,
            payload_length,
        })
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.stream_type.id();
        buf[4..8].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }
}

/// One demultiplexed unit of the attach stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub stream_type: StreamType,
    pub payload: Bytes,
}

impl Frame {
    /// Creates a frame
    ///
    /// # Panics
    /// Panics if the payload does not fit the 32-bit length field.
    pub fn new(stream_type: StreamType, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        assert!(
            u32::try_from(payload.len()).is_ok(),
            "frame payload exceeds u32::MAX bytes"
        );
        Self {
            stream_type,
            payload,
        }
    }

    /// Header describing this frame
    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            stream_type: self.stream_type,
            payload_length: self.payload.len() as u32,
        }
    }

    /// Encodes the frame in wire format (header followed by payload)
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        out.extend_from_slice(&self.header().encode());
        out.extend_from_slice(&self.payload);
        out
    }
}
