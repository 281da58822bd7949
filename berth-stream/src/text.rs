//! Frame payload to text
//!
//! The engine splits output into frames without regard for character
//! boundaries. [`TextDecoder`] holds back an unfinished UTF-8 sequence at
//! the end of a payload and completes it with the next frame of the same
//! stream. Invalid bytes still decode to U+FFFD.

use berth_core::domain::{Frame, StreamType};

/// Longest UTF-8 sequence, in bytes
const MAX_SEQUENCE: usize = 4;

/// Per-stream lossy UTF-8 decoder
#[derive(Debug, Default)]
pub struct TextDecoder {
    /// Unfinished sequences, indexed by stream id
    pending: [Vec<u8>; 3],
}

impl TextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a frame, carrying an unfinished trailing character over
    pub fn decode(&mut self, frame: &Frame) -> String {
        let pending = &mut self.pending[frame.stream_type.id() as usize];
        pending.extend_from_slice(&frame.payload);

        let complete = complete_prefix_len(pending);
        let text = String::from_utf8_lossy(&pending[..complete]).into_owned();
        pending.drain(..complete);
        text
    }

    /// Bytes still waiting for the rest of their character
    pub fn pending_len(&self, stream_type: StreamType) -> usize {
        self.pending[stream_type.id() as usize].len()
    }

    /// Decodes whatever is still held back; unfinished sequences become U+FFFD
    pub fn finish(&mut self, stream_type: StreamType) -> String {
        let pending = std::mem::take(&mut self.pending[stream_type.id() as usize]);
        String::from_utf8_lossy(&pending).into_owned()
    }
}

/// Length of `bytes` without a trailing, possibly unfinished, sequence
fn complete_prefix_len(bytes: &[u8]) -> usize {
    let window = bytes.len().saturating_sub(MAX_SEQUENCE - 1);

    for start in (window..bytes.len()).rev() {
        let byte = bytes[start];
        if is_continuation(byte) {
            continue;
        }

        let width = match byte {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return bytes.len(),
        };

        let tail = &bytes[start + 1..];
        if tail.len() < width - 1 && tail.iter().all(|b| is_continuation(*b)) {
            return start;
        }
        return bytes.len();
    }

    bytes.len()
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}
