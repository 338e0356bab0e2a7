//! Disk tier limits

use std::time::Duration;

/// Default maximum number of persisted entries
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Default disk time-to-live (1 hour)
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Limits applied by [`DiskStore`](crate::DiskStore)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskConfig {
    /// Entry count limit; oldest-by-access entries are evicted past it
    pub max_entries: usize,
    /// Age after which an entry is dropped regardless of access
    pub ttl: Duration,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: DEFAULT_TTL,
        }
    }
}

impl DiskConfig {
    /// Set the entry count limit
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the disk time-to-live
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}
