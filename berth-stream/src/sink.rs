//! Log sinks
//!
//! A sink is the append-only target the tailer writes decoded output to.
//! Every sink exposes a [`LogStatus`] so readers can tell an in-progress
//! log from a finalized one without racing on its length.
//!
//! File sinks also publish liveness across processes: while the log is being
//! appended to, a `<log>.live` marker file sits next to it.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};
use uuid::Uuid;

/// Append-only log target
///
/// Written by a single tailer. Readers may read concurrently and must
/// tolerate a partially written final line.
#[async_trait]
pub trait LogSink: Send {
    /// Appends decoded text
    async fn append(&mut self, text: &str) -> io::Result<()>;

    /// Makes everything appended so far visible to readers
    async fn flush(&mut self) -> io::Result<()>;

    /// Flushes and marks the log complete; later calls do nothing
    async fn finalize(&mut self) -> io::Result<()>;

    /// Handle readers use to check whether the log is still live
    fn status(&self) -> LogStatus;
}

/// Shared live/finalized flag of a log
#[derive(Debug, Clone)]
pub struct LogStatus {
    live: Arc<AtomicBool>,
}

impl LogStatus {
    fn live() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the log is still being appended to
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn mark_finalized(&self) {
        self.live.store(false, Ordering::Release);
    }
}

/// Path of the liveness marker for a log file
pub fn marker_path(log_path: &Path) -> PathBuf {
    let mut name = log_path.as_os_str().to_owned();
    name.push(".live");
    PathBuf::from(name)
}

/// Log file sink
pub struct FileLogSink {
    path: PathBuf,
    marker: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    status: LogStatus,
}

impl FileLogSink {
    /// Opens `path` for appending, creating it if needed
    ///
    /// # Arguments
    /// * `path` - Log file
    /// * `attachment` - Identifier written into the marker file
    /// * `with_marker` - Publish a `.live` marker while the log is live
    pub async fn open(
        path: impl AsRef<Path>,
        attachment: Uuid,
        with_marker: bool,
    ) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let marker = if with_marker {
            let marker = marker_path(&path);
            let contents = format!("{} {}\n", attachment, chrono::Utc::now().to_rfc3339());
            tokio::fs::write(&marker, contents).await?;
            Some(marker)
        } else {
            None
        };

        debug!("Opened log {} for attachment {}", path.display(), attachment);

        Ok(Self {
            path,
            marker,
            writer: Some(BufWriter::new(file)),
            status: LogStatus::live(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("log {} is already finalized", self.path.display()),
            )
        })
    }
}

#[async_trait]
impl LogSink for FileLogSink {
    async fn append(&mut self, text: &str) -> io::Result<()> {
        self.writer()?.write_all(text.as_bytes()).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush().await
    }

    async fn finalize(&mut self) -> io::Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };

        let flushed = writer.flush().await;
        drop(writer);

        if let Some(marker) = self.marker.take() {
            match tokio::fs::remove_file(&marker).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove live marker {}: {}", marker.display(), e),
            }
        }

        self.status.mark_finalized();
        debug!("Finalized log {}", self.path.display());

        flushed
    }

    fn status(&self) -> LogStatus {
        self.status.clone()
    }
}

impl Drop for FileLogSink {
    fn drop(&mut self) {
        if self.writer.is_none() {
            return;
        }

        warn!(
            "Log {} dropped without being finalized",
            self.path.display()
        );
        if let Some(marker) = self.marker.take() {
            let _ = std::fs::remove_file(marker);
        }
        self.status.mark_finalized();
    }
}

/// In-memory sink
///
/// Clones share the same buffer, so a test or in-process reader can keep a
/// clone while the tailer owns another.
#[derive(Debug, Clone)]
pub struct MemoryLogSink {
    buffer: Arc<Mutex<String>>,
    flushed: Arc<Mutex<usize>>,
    status: LogStatus,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(String::new())),
            flushed: Arc::new(Mutex::new(0)),
            status: LogStatus::live(),
        }
    }

    /// Everything appended so far
    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Text visible as of the last flush
    pub fn flushed_contents(&self) -> String {
        let len = *self.flushed.lock().unwrap_or_else(|e| e.into_inner());
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer[..len].to_string()
    }
}

impl Default for MemoryLogSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn append(&mut self, text: &str) -> io::Result<()> {
        if !self.status.is_live() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "log is already finalized",
            ));
        }
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_str(text);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        let len = self.buffer.lock().unwrap_or_else(|e| e.into_inner()).len();
        *self.flushed.lock().unwrap_or_else(|e| e.into_inner()) = len;
        Ok(())
    }

    async fn finalize(&mut self) -> io::Result<()> {
        if self.status.is_live() {
            self.flush().await?;
            self.status.mark_finalized();
        }
        Ok(())
    }

    fn status(&self) -> LogStatus {
        self.status.clone()
    }
}

/// Point-in-time view of a log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSnapshot {
    pub text: String,
    /// A tailer is still appending
    pub live: bool,
}

/// Reads a log file together with its liveness
///
/// The marker is checked before reading, so a log reported as finalized is
/// complete.
pub async fn read_log(path: impl AsRef<Path>) -> io::Result<LogSnapshot> {
    let path = path.as_ref();
    let live = tokio::fs::try_exists(marker_path(path)).await?;
    let bytes = tokio::fs::read(path).await?;

    Ok(LogSnapshot {
        text: String::from_utf8_lossy(&bytes).into_owned(),
        live,
    })
}
