// config.rs — Refresh and staleness settings for the policy cache.

use std::time::Duration;

/// Default seconds between background refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Default age of the last successful refresh beyond which the cache fails open.
pub const DEFAULT_STALE_TOLERANCE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub refresh_interval: Duration,
    /// `None` (or zero) disables the staleness check entirely.
    pub stale_tolerance: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            stale_tolerance: Some(DEFAULT_STALE_TOLERANCE),
        }
    }
}

impl CacheConfig {
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_stale_tolerance(mut self, tolerance: Option<Duration>) -> Self {
        self.stale_tolerance = tolerance;
        self
    }

    /// The tolerance to enforce, if any.
    pub fn effective_stale_tolerance(&self) -> Option<Duration> {
        self.stale_tolerance.filter(|t| !t.is_zero())
    }

    /// Refresh interval clamped to something the worker can wait on.
    pub(crate) fn effective_refresh_interval(&self) -> Duration {
        self.refresh_interval.max(Duration::from_millis(10))
    }
}
