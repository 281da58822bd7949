//! Attach stream tailer
//!
//! Runs one background task per attachment that polls a container's attach
//! stream into a log sink while the owning build is running:
//! - Each pass drains every frame available now, appends the decoded text
//!   and flushes the sink
//! - Between passes the task waits `poll_interval`; stop requests and the
//!   build predicate are only observed there
//! - After a stop request or the build ending, one final pass delivers any
//!   trailing output before the transport and sink are released
//!
//! A decode failure stops the tailer but is never propagated as a panic: the
//! log keeps everything decoded before the failure and the summary records
//! why tailing ended.
//!
//! A tailer owns exactly one transport, so a build step attaches to a
//! single container at a time.

use berth_core::domain::StreamType;
use std::fmt;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::build::BuildStatus;
use crate::config::TailerConfig;
use crate::demux::FrameDemultiplexer;
use crate::error::TailError;
use crate::sink::{LogSink, LogStatus};
use crate::text::TextDecoder;

/// Lifecycle phase of a tailer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created, not yet attached
    Idle,
    Running,
    /// Terminal; resources have been released
    Stopped,
}

/// Why a tailer stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Explicit stop, or the handle was dropped
    Requested,
    /// The build predicate turned false
    BuildFinished,
    /// The engine closed the stream
    EndOfStream,
    /// Decoding or writing failed
    Failed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Requested => write!(f, "stop requested"),
            StopReason::BuildFinished => write!(f, "build finished"),
            StopReason::EndOfStream => write!(f, "end of stream"),
            StopReason::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Totals reported when a tailer stops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailSummary {
    pub attachment: Uuid,
    pub frames: u64,
    /// Payload bytes appended to the sink
    pub bytes: u64,
    pub stop_reason: StopReason,
}

/// How a drain pass ended
enum PassEnd {
    /// No frame arrived within `drain_idle`, or the pass hit its time budget
    Idle,
    EndOfStream,
}

/// A tailer that has not been started
pub struct StreamTailer<R, S> {
    id: Uuid,
    transport: R,
    sink: S,
    build: Box<dyn BuildStatus>,
    config: TailerConfig,
}

impl<R, S> StreamTailer<R, S>
where
    R: AsyncRead + Unpin + Send + 'static,
    S: LogSink + 'static,
{
    /// Creates an idle tailer
    ///
    /// # Arguments
    /// * `transport` - The container's attach stream
    /// * `sink` - Log target, written only by this tailer
    /// * `build` - Predicate telling whether the owning build still runs
    /// * `config` - Polling timings
    pub fn new(transport: R, sink: S, build: impl BuildStatus, config: TailerConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            sink,
            build: Box::new(build),
            config,
        }
    }

    /// Uses a caller-chosen attachment id instead of a random one
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        Phase::Idle
    }

    /// Spawns the tailing task
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> TailerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (phase_tx, phase_rx) = watch::channel(Phase::Running);
        let log_status = self.sink.status();
        let id = self.id;

        info!(
            "Attaching tailer {} (poll interval {:?})",
            id, self.config.poll_interval
        );

        let span = info_span!("tailer", attachment = %id);
        let task = tokio::spawn(self.run(stop_rx, phase_tx).instrument(span));

        TailerHandle {
            id,
            stop_tx,
            phase_rx,
            log_status,
            task,
        }
    }

    async fn run(
        self,
        mut stop_rx: watch::Receiver<bool>,
        phase_tx: watch::Sender<Phase>,
    ) -> TailSummary {
        let StreamTailer {
            id,
            transport,
            mut sink,
            build,
            config,
        } = self;

        let worker = Worker {
            build,
            config,
            text: TextDecoder::new(),
            frames: 0,
            bytes: 0,
        };
        let mut demux = FrameDemultiplexer::new(transport);

        let (mut worker, stop_reason) = worker.tail(&mut demux, &mut sink, &mut stop_rx).await;

        // Every exit route goes through here
        worker.release(&mut demux, &mut sink).await;
        phase_tx.send_replace(Phase::Stopped);

        match &stop_reason {
            StopReason::Failed(reason) => {
                error!("Tailer {} stopped after a failure: {}", id, reason)
            }
            reason => info!("Tailer {} stopped: {}", id, reason),
        }

        TailSummary {
            attachment: id,
            frames: worker.frames,
            bytes: worker.bytes,
            stop_reason,
        }
    }
}

/// State owned by the running task
struct Worker {
    build: Box<dyn BuildStatus>,
    config: TailerConfig,
    text: TextDecoder,
    frames: u64,
    bytes: u64,
}

impl Worker {
    async fn tail<R, S>(
        mut self,
        demux: &mut FrameDemultiplexer<R>,
        sink: &mut S,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> (Self, StopReason)
    where
        R: AsyncRead + Unpin,
        S: LogSink,
    {
        let reason = loop {
            match self.drain_pass(demux, sink).await {
                Ok(PassEnd::Idle) => {}
                Ok(PassEnd::EndOfStream) => break StopReason::EndOfStream,
                Err(e) => break StopReason::Failed(e.to_string()),
            }

            if let Some(reason) = self.pending_stop(stop_rx) {
                break self.final_pass(demux, sink, reason).await;
            }

            tokio::select! {
                _ = time::sleep(self.config.poll_interval) => {}
                _ = stop_rx.changed() => {}
            }

            if let Some(reason) = self.pending_stop(stop_rx) {
                break self.final_pass(demux, sink, reason).await;
            }
        };

        (self, reason)
    }

    /// Stop condition observed between passes, if any
    fn pending_stop(&self, stop_rx: &watch::Receiver<bool>) -> Option<StopReason> {
        // A dropped handle counts as a stop request
        if *stop_rx.borrow() || stop_rx.has_changed().is_err() {
            return Some(StopReason::Requested);
        }
        if !self.build.is_running() {
            return Some(StopReason::BuildFinished);
        }
        None
    }

    /// Delivers output produced between the last pass and the stop signal
    async fn final_pass<R, S>(
        &mut self,
        demux: &mut FrameDemultiplexer<R>,
        sink: &mut S,
        reason: StopReason,
    ) -> StopReason
    where
        R: AsyncRead + Unpin,
        S: LogSink,
    {
        debug!("Final drain pass ({})", reason);
        match self.drain_pass(demux, sink).await {
            Ok(_) => reason,
            Err(e) => StopReason::Failed(e.to_string()),
        }
    }

    /// Appends every frame that arrives without a `drain_idle` gap
    ///
    /// A pass never runs longer than `poll_interval`, so a chatty stream
    /// cannot starve the stop checks. Frames decoded before a failure are
    /// flushed before the error is returned.
    async fn drain_pass<R, S>(
        &mut self,
        demux: &mut FrameDemultiplexer<R>,
        sink: &mut S,
    ) -> Result<PassEnd, TailError>
    where
        R: AsyncRead + Unpin,
        S: LogSink,
    {
        let started = Instant::now();
        let mut batch = 0u64;

        let outcome = loop {
            if started.elapsed() >= self.config.poll_interval {
                break Ok(PassEnd::Idle);
            }

            // Frames already available skip the idle timer
            let ready = match demux.try_next_frame() {
                Ok(ready) => ready,
                Err(e) => break Err(TailError::from(e)),
            };
            let frame = match ready {
                Some(frame) => frame,
                None if demux.is_finished() => break Ok(PassEnd::EndOfStream),
                None => match time::timeout(self.config.drain_idle, demux.next_frame()).await {
                    Err(_) => break Ok(PassEnd::Idle),
                    Ok(Ok(Some(frame))) => frame,
                    Ok(Ok(None)) => break Ok(PassEnd::EndOfStream),
                    Ok(Err(e)) => break Err(TailError::from(e)),
                },
            };

            // Empty while a character is split across frames
            let text = self.text.decode(&frame);
            if !text.is_empty() {
                if let Err(e) = sink.append(&text).await {
                    break Err(TailError::Sink(e));
                }
            }
            batch += 1;
            self.frames += 1;
            self.bytes += frame.payload.len() as u64;
        };

        if batch > 0 {
            sink.flush().await.map_err(TailError::Sink)?;
            debug!("Appended {} frame(s) to the log", batch);
        }

        outcome
    }

    /// Releases the transport and finalizes the sink
    async fn release<R, S>(&mut self, demux: &mut FrameDemultiplexer<R>, sink: &mut S)
    where
        R: AsyncRead + Unpin,
        S: LogSink,
    {
        let partial = demux.buffered_len();
        if partial > 0 {
            warn!("Releasing with {} byte(s) of an incomplete frame", partial);
        }

        for stream_type in [StreamType::Stdin, StreamType::Stdout, StreamType::Stderr] {
            let rest = self.text.finish(stream_type);
            if rest.is_empty() {
                continue;
            }
            if let Err(e) = sink.append(&rest).await {
                warn!("Failed to append trailing {} output: {}", stream_type, e);
            }
        }

        match time::timeout(self.config.release_timeout, demux.close()).await {
            Ok(Ok(discarded)) if discarded > 0 => {
                debug!("Discarded {} undelivered byte(s) on release", discarded)
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to drain transport on release: {}", e),
            Err(_) => warn!(
                "Transport still open after {:?}; releasing without draining",
                self.config.release_timeout
            ),
        }

        if let Err(e) = sink.finalize().await {
            warn!("Failed to finalize log: {}", e);
        }
    }
}

/// Handle to a running tailer
///
/// Dropping the handle requests a stop; the task still performs its final
/// pass and releases its resources.
pub struct TailerHandle {
    id: Uuid,
    stop_tx: watch::Sender<bool>,
    phase_rx: watch::Receiver<Phase>,
    log_status: LogStatus,
    task: JoinHandle<TailSummary>,
}

impl TailerHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current phase: `Running` until the task has released its resources
    pub fn phase(&self) -> Phase {
        *self.phase_rx.borrow()
    }

    /// Liveness of the log this tailer writes
    pub fn log_status(&self) -> LogStatus {
        self.log_status.clone()
    }

    /// Signals the task to stop after its current pass
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Waits until the tailer reaches `Stopped` on its own
    pub async fn stopped(&mut self) {
        let _ = self.phase_rx.wait_for(|phase| *phase == Phase::Stopped).await;
    }

    /// Requests a stop and waits for the final pass and release
    pub async fn stop(self) -> Result<TailSummary, TailError> {
        self.request_stop();
        self.join().await
    }

    /// Waits for the tailer to stop without requesting it
    pub async fn join(self) -> Result<TailSummary, TailError> {
        let TailerHandle { stop_tx, task, .. } = self;
        let summary = task.await;
        drop(stop_tx);
        Ok(summary?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::AlwaysRunning;
    use crate::sink::{FileLogSink, MemoryLogSink, read_log};
    use berth_core::domain::{Frame, StreamType};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn wire(stream_type: StreamType, text: &str) -> Vec<u8> {
        Frame::new(stream_type, text.as_bytes().to_vec()).encode()
    }

    fn config() -> TailerConfig {
        TailerConfig::default()
            .with_poll_interval(Duration::from_secs(2))
            .with_drain_idle(Duration::from_millis(50))
            .with_release_timeout(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_and_explicit_stop() {
        let (mut engine, transport) = tokio::io::duplex(1024);
        let sink = MemoryLogSink::new();
        let log = sink.clone();

        let tailer = StreamTailer::new(transport, sink, AlwaysRunning, config());
        assert_eq!(tailer.phase(), Phase::Idle);

        let handle = tailer.start();
        assert_eq!(handle.phase(), Phase::Running);

        engine.write_all(&wire(StreamType::Stdout, "compiling\n")).await.unwrap();
        engine.write_all(&wire(StreamType::Stderr, "warning\n")).await.unwrap();
        time::sleep(Duration::from_secs(3)).await;

        assert_eq!(log.flushed_contents(), "compiling\nwarning\n");
        assert!(handle.log_status().is_live());

        let status = handle.log_status();
        let summary = handle.stop().await.unwrap();

        assert_eq!(summary.stop_reason, StopReason::Requested);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.bytes, 18);
        assert!(!status.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_pass_delivers_trailing_output() {
        let (mut engine, transport) = tokio::io::duplex(1024);
        let sink = MemoryLogSink::new();
        let log = sink.clone();

        let handle = StreamTailer::new(transport, sink, AlwaysRunning, config()).start();
        time::sleep(Duration::from_millis(500)).await;

        // Written while the task waits between passes
        engine.write_all(&wire(StreamType::Stdout, "last words\n")).await.unwrap();
        let summary = handle.stop().await.unwrap();

        assert_eq!(summary.stop_reason, StopReason::Requested);
        assert_eq!(log.contents(), "last words\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_character_split_across_frames_reaches_log_intact() {
        let (mut engine, transport) = tokio::io::duplex(1024);
        let sink = MemoryLogSink::new();
        let log = sink.clone();

        let handle = StreamTailer::new(transport, sink, AlwaysRunning, config()).start();

        let snowman = "☃".as_bytes();
        let mut tail = snowman[2..].to_vec();
        tail.push(b'\n');
        engine.write_all(&Frame::new(StreamType::Stdout, snowman[..2].to_vec()).encode()).await.unwrap();
        engine.write_all(&wire(StreamType::Stderr, "warn\n")).await.unwrap();
        engine.write_all(&Frame::new(StreamType::Stdout, tail).encode()).await.unwrap();
        drop(engine);

        let summary = handle.join().await.unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(log.contents(), "warn\n☃\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unfinished_character_is_flushed_on_release() {
        let (mut engine, transport) = tokio::io::duplex(1024);
        let sink = MemoryLogSink::new();
        let log = sink.clone();

        let handle = StreamTailer::new(transport, sink, AlwaysRunning, config()).start();

        engine.write_all(&Frame::new(StreamType::Stdout, vec![b'a', 0xE2, 0x98]).encode()).await.unwrap();
        drop(engine);

        handle.join().await.unwrap();
        assert_eq!(log.contents(), "a\u{FFFD}");
        assert!(!log.status().is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_build_finishes() {
        let (mut engine, transport) = tokio::io::duplex(1024);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let sink = MemoryLogSink::new();
        let log = sink.clone();

        let mut handle = StreamTailer::new(
            transport,
            sink,
            move || flag.load(Ordering::SeqCst),
            config(),
        )
        .start();

        engine.write_all(&wire(StreamType::Stdout, "tests passed\n")).await.unwrap();
        running.store(false, Ordering::SeqCst);

        handle.stopped().await;
        assert_eq!(handle.phase(), Phase::Stopped);

        let summary = handle.join().await.unwrap();
        assert_eq!(summary.stop_reason, StopReason::BuildFinished);
        assert_eq!(log.contents(), "tests passed\n");
        assert!(!log.status().is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_end_of_stream() {
        let (mut engine, transport) = tokio::io::duplex(1024);
        let sink = MemoryLogSink::new();
        let log = sink.clone();

        let handle = StreamTailer::new(transport, sink, AlwaysRunning, config()).start();

        engine.write_all(&wire(StreamType::Stdout, "bye\n")).await.unwrap();
        drop(engine);

        let summary = handle.join().await.unwrap();
        assert_eq!(summary.stop_reason, StopReason::EndOfStream);
        assert_eq!(summary.frames, 1);
        assert_eq!(log.contents(), "bye\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_error_stops_but_keeps_log() {
        let (mut engine, transport) = tokio::io::duplex(1024);
        let sink = MemoryLogSink::new();
        let log = sink.clone();

        let handle = StreamTailer::new(transport, sink, AlwaysRunning, config()).start();

        engine.write_all(&wire(StreamType::Stdout, "before\n")).await.unwrap();
        engine.write_all(&[9, 0, 0, 0, 0, 0, 0, 1, b'x']).await.unwrap();

        let summary = handle.join().await.unwrap();
        match summary.stop_reason {
            StopReason::Failed(reason) => assert!(reason.contains("invalid stream type 9")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(log.flushed_contents(), "before\n");
        assert!(!log.status().is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_stops_tailer() {
        let (_engine, transport) = tokio::io::duplex(1024);
        let sink = MemoryLogSink::new();
        let log = sink.clone();

        let handle = StreamTailer::new(transport, sink, AlwaysRunning, config()).start();
        drop(handle);

        time::sleep(Duration::from_secs(5)).await;
        assert!(!log.status().is_live());
    }

    #[tokio::test]
    async fn test_tails_into_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("step.log");
        let attachment = Uuid::new_v4();

        let mut stream = wire(StreamType::Stdout, "line one\n");
        stream.extend(wire(StreamType::Stderr, "line two\n"));

        let sink = FileLogSink::open(&path, attachment, true).await.unwrap();
        let transport = std::io::Cursor::new(stream);
        let handle = StreamTailer::new(transport, sink, AlwaysRunning, config())
            .with_id(attachment)
            .start();

        let summary = handle.join().await.unwrap();
        assert_eq!(summary.attachment, attachment);
        assert_eq!(summary.stop_reason, StopReason::EndOfStream);

        let snapshot = read_log(&path).await.unwrap();
        assert_eq!(snapshot.text, "line one\nline two\n");
        assert!(!snapshot.live);
    }
}
