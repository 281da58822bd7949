//! Tailer configuration
//!
//! Defines the timings of the tailing loop. All values can be tuned from
//! the environment to trade output latency against polling overhead.

use std::time::Duration;

use crate::error::ConfigError;

/// Tailer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailerConfig {
    /// Wait between drain passes; bounds output latency
    pub poll_interval: Duration,

    /// A drain pass ends once no frame arrives for this long
    pub drain_idle: Duration,

    /// Maximum time spent draining the transport before releasing it
    pub release_timeout: Duration,

    /// Whether file sinks publish a `.live` marker next to the log
    pub live_marker: bool,
}

impl TailerConfig {
    /// Creates a configuration with defaults
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            drain_idle: Duration::from_millis(100),
            release_timeout: Duration::from_secs(5),
            live_marker: true,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognized environment variables:
    /// - BERTH_POLL_INTERVAL_MS (optional, default: 2000)
    /// - BERTH_DRAIN_IDLE_MS (optional, default: 100)
    /// - BERTH_RELEASE_TIMEOUT_MS (optional, default: 5000)
    /// - BERTH_LIVE_MARKER (optional, `0`/`false` disables, default: enabled)
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::new();

        let millis = |name: &str, default: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        let live_marker = std::env::var("BERTH_LIVE_MARKER")
            .map(|s| !matches!(s.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(defaults.live_marker);

        Self {
            poll_interval: millis("BERTH_POLL_INTERVAL_MS", defaults.poll_interval),
            drain_idle: millis("BERTH_DRAIN_IDLE_MS", defaults.drain_idle),
            release_timeout: millis("BERTH_RELEASE_TIMEOUT_MS", defaults.release_timeout),
            live_marker,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_drain_idle(mut self, idle: Duration) -> Self {
        self.drain_idle = idle;
        self
    }

    pub fn with_release_timeout(mut self, timeout: Duration) -> Self {
        self.release_timeout = timeout;
        self
    }

    pub fn with_live_marker(mut self, enabled: bool) -> Self {
        self.live_marker = enabled;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "poll_interval",
            });
        }

        if self.drain_idle.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "drain_idle",
            });
        }

        if self.release_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "release_timeout",
            });
        }

        if self.drain_idle >= self.poll_interval {
            return Err(ConfigError::DrainIdleTooLong {
                drain_idle_ms: self.drain_idle.as_millis(),
                poll_interval_ms: self.poll_interval.as_millis(),
            });
        }

        Ok(())
    }
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self::new()
    }
}
