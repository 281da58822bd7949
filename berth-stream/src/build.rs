//! Build liveness predicates
//!
//! The tailer keeps running only while the owning build does. The build
//! layer supplies the predicate; closures work directly.

use std::path::PathBuf;

/// Reports whether the owning build is still running
pub trait BuildStatus: Send + Sync + 'static {
    fn is_running(&self) -> bool;
}

impl<F> BuildStatus for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn is_running(&self) -> bool {
        self()
    }
}

/// Build that never ends on its own; only an explicit stop ends tailing
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRunning;

impl BuildStatus for AlwaysRunning {
    fn is_running(&self) -> bool {
        true
    }
}

/// Build considered running while a marker file exists
#[derive(Debug, Clone)]
pub struct MarkerFile {
    path: PathBuf,
}

impl MarkerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BuildStatus for MarkerFile {
    fn is_running(&self) -> bool {
        self.path.exists()
    }
}
