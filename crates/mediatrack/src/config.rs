//! Polling configuration

use std::time::Duration;

/// Default pause between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default ceiling on how long one task is tracked (30 minutes)
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(1800);

/// Timing used by [`TaskTracker`](crate::TaskTracker)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Pause between status polls
    pub poll_interval: Duration,
    /// Timeout applied when a caller does not give one
    pub max_wait: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

impl TrackerConfig {
    /// Set the pause between polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the default timeout
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}
