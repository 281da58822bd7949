//! Attach stream demultiplexer
//!
//! Decodes the engine's multiplexed stream into [`Frame`]s. Bytes read from
//! the transport are buffered inside the demultiplexer, so a caller that
//! drops a pending [`FrameDemultiplexer::next_frame`] future (for example on
//! a timeout) loses nothing: the partially received frame completes on the
//! next call.
//!
//! End of stream is only clean at a frame boundary. Running out of bytes
//! inside a header or payload is a truncation error.

use berth_core::domain::frame::{FrameHeader, HEADER_SIZE};
use berth_core::domain::Frame;
use bytes::{Buf, BytesMut};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::debug;

use crate::error::{DemuxError, Result};

/// Bytes requested from the transport per read
const READ_CHUNK: usize = 8 * 1024;

/// Frame decoder bound to one transport
///
/// Not seekable; decoding again requires reopening the transport.
pub struct FrameDemultiplexer<R> {
    /// Transport, `None` once closed
    reader: Option<R>,
    /// Bytes read but not yet returned as frames
    buffer: BytesMut,
    /// Transport reported end of file
    eof: bool,
    /// End of stream or a protocol error was returned; nothing more follows
    finished: bool,
}

impl<R: AsyncRead + Unpin> FrameDemultiplexer<R> {
    /// Creates a demultiplexer reading from `reader`
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            buffer: BytesMut::with_capacity(READ_CHUNK),
            eof: false,
            finished: false,
        }
    }

    /// Reads the next frame
    ///
    /// # Returns
    /// - `Ok(Some(frame))` for each complete frame
    /// - `Ok(None)` at a clean end of stream, and on every call after it
    ///
    /// # Errors
    /// - `TruncatedHeader` if the stream ends after 1 to 7 header bytes
    /// - `InvalidStreamType` if a header names an unknown stream
    /// - `TruncatedPayload` if the stream ends inside a payload
    /// - `Io` if the transport fails
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        std::future::poll_fn(|cx| self.poll_next_frame(cx)).await
    }

    /// Polls for the next frame, reading from the transport as needed
    pub fn poll_next_frame(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<Frame>>> {
        loop {
            if self.finished {
                return Poll::Ready(Ok(None));
            }

            match self.decode_buffered() {
                Ok(Some(frame)) => return Poll::Ready(Ok(Some(frame))),
                Ok(None) => {}
                Err(e) => {
                    self.finished = true;
                    return Poll::Ready(Err(e));
                }
            }

            if self.eof {
                self.finished = true;
                return Poll::Ready(self.end_of_stream());
            }

            let Some(reader) = self.reader.as_mut() else {
                self.finished = true;
                return Poll::Ready(Ok(None));
            };

            let mut chunk = [0u8; READ_CHUNK];
            let mut read_buf = ReadBuf::new(&mut chunk);
            match Pin::new(reader).poll_read(cx, &mut read_buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Poll::Ready(Err(e)) => {
                    self.finished = true;
                    return Poll::Ready(Err(e.into()));
                }
                Poll::Ready(Ok(())) => {
                    let filled = read_buf.filled();
                    if filled.is_empty() {
                        self.eof = true;
                    } else {
                        self.buffer.extend_from_slice(filled);
                    }
                }
            }
        }
    }

    /// Returns the next frame only if it can be decoded without waiting
    ///
    /// Takes whatever the transport has ready, then decodes from the buffer.
    /// `Ok(None)` means no complete frame is available yet, or the stream
    /// has ended; [`is_finished`](Self::is_finished) tells the two apart.
    pub fn try_next_frame(&mut self) -> Result<Option<Frame>> {
        let mut cx = Context::from_waker(std::task::Waker::noop());
        match self.poll_next_frame(&mut cx) {
            Poll::Ready(result) => result,
            Poll::Pending => Ok(None),
        }
    }

    /// Whether end of stream or an error has been returned
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drains and discards the rest of the transport, then releases it
    ///
    /// Some transports can only be reused once fully consumed, so the
    /// stream is read to its end rather than dropped. Safe to call more
    /// than once; later calls do nothing.
    ///
    /// # Returns
    /// Number of bytes discarded, including undecoded buffered bytes
    pub async fn close(&mut self) -> Result<u64> {
        let Some(mut reader) = self.reader.take() else {
            return Ok(0);
        };

        self.finished = true;
        let buffered = self.buffer.len() as u64;
        self.buffer.clear();

        let drained = if self.eof {
            0
        } else {
            tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?
        };

        debug!(
            "Released transport after discarding {} byte(s)",
            buffered + drained
        );
        Ok(buffered + drained)
    }

    /// Bytes received but not yet returned as frames
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Splits one complete frame off the buffer, if present
    fn decode_buffered(&mut self) -> Result<Option<Frame>> {
        let Some(header) = self.peek_header()? else {
            return Ok(None);
        };

        let payload_len = header.payload_length as usize;
        if self.buffer.len() - HEADER_SIZE < payload_len {
            return Ok(None);
        }

        self.buffer.advance(HEADER_SIZE);
        let payload = self.buffer.split_to(payload_len).freeze();

        Ok(Some(Frame {
            stream_type: header.stream_type,
            payload,
        }))
    }

    fn peek_header(&self) -> Result<Option<FrameHeader>> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&self.buffer[..HEADER_SIZE]);

        FrameHeader::decode(&raw)
            .map(Some)
            .map_err(DemuxError::InvalidStreamType)
    }

    /// Classifies leftover bytes once the transport is exhausted
    fn end_of_stream(&self) -> Result<Option<Frame>> {
        let available = self.buffer.len();
        if available == 0 {
            return Ok(None);
        }

        match self.peek_header()? {
            None => Err(DemuxError::TruncatedHeader { available }),
            Some(header) => Err(DemuxError::TruncatedPayload {
                expected: header.payload_length,
                available: available - HEADER_SIZE,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_core::domain::StreamType;
    use tokio::io::AsyncWriteExt;

    const ALL_STREAMS: [StreamType; 3] = [StreamType::Stdin, StreamType::Stdout, StreamType::Stderr];

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_round_trip_all_streams_and_sizes() {
        for stream_type in ALL_STREAMS {
            for len in [0, 1, 7, 8, 9, 4096, 8 * 1024 + 3, 65536] {
                let frame = Frame::new(stream_type, payload(len));
                let wire = frame.encode();

                let mut demux = FrameDemultiplexer::new(&wire[..]);
                assert_eq!(demux.next_frame().await.unwrap(), Some(frame));
                assert_eq!(demux.next_frame().await.unwrap(), None);
            }
        }
    }

    #[tokio::test]
    async fn test_sequence_of_frames() {
        let frames = vec![
            Frame::new(StreamType::Stdout, &b"building...\n"[..]),
            Frame::new(StreamType::Stderr, &b"warning: unused\n"[..]),
            Frame::new(StreamType::Stdout, &b""[..]),
            Frame::new(StreamType::Stdout, &b"done\n"[..]),
        ];
        let wire: Vec<u8> = frames.iter().flat_map(|f| f.encode()).collect();

        let mut demux = FrameDemultiplexer::new(&wire[..]);
        let mut decoded = Vec::new();
        while let Some(frame) = demux.next_frame().await.unwrap() {
            decoded.push(frame);
        }

        assert_eq!(decoded, frames);
    }

    #[tokio::test]
    async fn test_empty_stream_is_clean_end() {
        let mut demux = FrameDemultiplexer::new(&b""[..]);
        assert!(demux.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_header() {
        let wire = Frame::new(StreamType::Stdout, &b"abc"[..]).encode();

        for cut in 1..HEADER_SIZE {
            let mut demux = FrameDemultiplexer::new(&wire[..cut]);
            match demux.next_frame().await {
                Err(DemuxError::TruncatedHeader { available }) => assert_eq!(available, cut),
                other => panic!("expected TruncatedHeader for {} bytes, got {:?}", cut, other),
            }
        }
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        let wire = Frame::new(StreamType::Stderr, payload(32)).encode();

        for cut in HEADER_SIZE..wire.len() {
            let mut demux = FrameDemultiplexer::new(&wire[..cut]);
            match demux.next_frame().await {
                Err(DemuxError::TruncatedPayload {
                    expected,
                    available,
                }) => {
                    assert_eq!(expected, 32);
                    assert_eq!(available, cut - HEADER_SIZE);
                }
                other => panic!("expected TruncatedPayload at {}, got {:?}", cut, other),
            }
        }
    }

    #[tokio::test]
    async fn test_truncation_after_complete_frame() {
        let mut wire = Frame::new(StreamType::Stdout, &b"ok"[..]).encode();
        wire.extend_from_slice(&[1, 0, 0]);

        let mut demux = FrameDemultiplexer::new(&wire[..]);
        assert!(demux.next_frame().await.unwrap().is_some());
        assert!(matches!(
            demux.next_frame().await,
            Err(DemuxError::TruncatedHeader { available: 3 })
        ));
    }

    #[tokio::test]
    async fn test_invalid_stream_type() {
        let wire = [3u8, 0, 0, 0, 0, 0, 0, 1, b'x'];
        let mut demux = FrameDemultiplexer::new(&wire[..]);

        let err = demux.next_frame().await.unwrap_err();
        assert!(matches!(err, DemuxError::InvalidStreamType(3)));
        assert!(err.is_protocol());

        // Terminal after a protocol error
        assert!(demux.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_frames_split_across_reads() {
        let (mut writer, reader) = tokio::io::duplex(3);
        let frames = vec![
            Frame::new(StreamType::Stdout, &b"hello "[..]),
            Frame::new(StreamType::Stderr, &b"world"[..]),
        ];
        let wire: Vec<u8> = frames.iter().flat_map(|f| f.encode()).collect();

        let feeder = tokio::spawn(async move {
            writer.write_all(&wire).await.unwrap();
        });

        let mut demux = FrameDemultiplexer::new(reader);
        assert_eq!(demux.next_frame().await.unwrap(), Some(frames[0].clone()));
        assert_eq!(demux.next_frame().await.unwrap(), Some(frames[1].clone()));

        feeder.await.unwrap();
        assert_eq!(demux.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dropped_read_keeps_partial_frame() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let frame = Frame::new(StreamType::Stdout, &b"partial"[..]);
        let wire = frame.encode();

        let mut demux = FrameDemultiplexer::new(reader);
        writer.write_all(&wire[..5]).await.unwrap();

        let pending =
            tokio::time::timeout(std::time::Duration::from_millis(10), demux.next_frame()).await;
        assert!(pending.is_err());
        assert_eq!(demux.buffered_len(), 5);

        writer.write_all(&wire[5..]).await.unwrap();
        assert_eq!(demux.next_frame().await.unwrap(), Some(frame));
    }

    #[tokio::test]
    async fn test_try_next_frame_never_waits() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let first = Frame::new(StreamType::Stdout, &b"ready"[..]);
        let second = Frame::new(StreamType::Stderr, &b"later"[..]);
        let second_wire = second.encode();

        let mut demux = FrameDemultiplexer::new(reader);
        assert!(demux.try_next_frame().unwrap().is_none());
        assert!(!demux.is_finished());

        writer.write_all(&first.encode()).await.unwrap();
        writer.write_all(&second_wire[..HEADER_SIZE + 2]).await.unwrap();

        assert_eq!(demux.try_next_frame().unwrap(), Some(first));
        assert!(demux.try_next_frame().unwrap().is_none());
        assert_eq!(demux.buffered_len(), HEADER_SIZE + 2);

        writer.write_all(&second_wire[HEADER_SIZE + 2..]).await.unwrap();
        drop(writer);

        assert_eq!(demux.try_next_frame().unwrap(), Some(second));
        assert!(demux.try_next_frame().unwrap().is_none());
        assert!(demux.is_finished());
    }

    #[tokio::test]
    async fn test_close_drains_and_is_idempotent() {
        let wire: Vec<u8> = (0..4)
            .flat_map(|_| Frame::new(StreamType::Stdout, payload(100)).encode())
            .collect();

        let mut demux = FrameDemultiplexer::new(&wire[..]);
        assert!(demux.next_frame().await.unwrap().is_some());

        let discarded = demux.close().await.unwrap();
        assert_eq!(discarded, (wire.len() - (HEADER_SIZE + 100)) as u64);

        assert_eq!(demux.close().await.unwrap(), 0);
        assert!(demux.next_frame().await.unwrap().is_none());
    }
}
