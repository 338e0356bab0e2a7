//! Cache manager configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use mediastore::DiskConfig;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Default memory entry budget
pub const DEFAULT_MEMORY_ITEMS: usize = 1000;

/// Default memory byte budget (100 MiB)
pub const DEFAULT_MEMORY_BYTES: usize = 100 * 1024 * 1024;

/// Default memory time-to-live (1 hour)
pub const DEFAULT_MEMORY_TTL: Duration = Duration::from_secs(3600);

/// Default background cleanup period (5 minutes)
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Configuration for [`CacheManager`](crate::CacheManager)
///
/// Durations deserialize from whole seconds. Missing fields take their
/// defaults, so `{"cache_dir": "/var/cache/media"}` is a complete document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding `index.json` and the blob files
    pub cache_dir: PathBuf,
    /// Memory entry budget
    pub memory_max_items: usize,
    /// Memory byte budget
    pub memory_max_bytes: usize,
    /// Memory time-to-live
    #[serde(deserialize_with = "seconds")]
    pub memory_ttl: Duration,
    /// Disk entry budget
    pub disk_max_entries: usize,
    /// Disk time-to-live
    #[serde(deserialize_with = "seconds")]
    pub disk_ttl: Duration,
    /// Schedule related keys for promotion on every hit
    pub enable_preload: bool,
    /// Preload worker threads
    pub preload_workers: usize,
    /// Related keys considered per hit
    pub preload_fanout: usize,
    /// Access timestamps kept per key
    pub history_len: usize,
    /// Background cleanup period
    #[serde(deserialize_with = "seconds")]
    pub cleanup_interval: Duration,
    /// Longest `stop()` waits for the cleanup thread
    #[serde(deserialize_with = "seconds")]
    pub stop_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            memory_max_items: DEFAULT_MEMORY_ITEMS,
            memory_max_bytes: DEFAULT_MEMORY_BYTES,
            memory_ttl: DEFAULT_MEMORY_TTL,
            disk_max_entries: mediastore::DEFAULT_MAX_ENTRIES,
            disk_ttl: mediastore::DEFAULT_TTL,
            enable_preload: true,
            preload_workers: 2,
            preload_fanout: 3,
            history_len: 50,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    /// Default configuration rooted at `cache_dir`
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Set the memory entry budget
    pub fn with_memory_max_items(mut self, max_items: usize) -> Self {
        self.memory_max_items = max_items;
        self
    }

    /// Set the memory byte budget
    pub fn with_memory_max_bytes(mut self, max_bytes: usize) -> Self {
        self.memory_max_bytes = max_bytes;
        self
    }

    /// Set the memory time-to-live
    pub fn with_memory_ttl(mut self, ttl: Duration) -> Self {
        self.memory_ttl = ttl;
        self
    }

    /// Set the disk entry budget
    pub fn with_disk_max_entries(mut self, max_entries: usize) -> Self {
        self.disk_max_entries = max_entries;
        self
    }

    /// Set the disk time-to-live
    pub fn with_disk_ttl(mut self, ttl: Duration) -> Self {
        self.disk_ttl = ttl;
        self
    }

    /// Enable or disable speculative preloading
    pub fn with_preload(mut self, enabled: bool) -> Self {
        self.enable_preload = enabled;
        self
    }

    /// Set the preload worker count
    pub fn with_preload_workers(mut self, workers: usize) -> Self {
        self.preload_workers = workers;
        self
    }

    /// Set the background cleanup period
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Limits handed to the disk tier
    pub fn disk_config(&self) -> DiskConfig {
        DiskConfig::default()
            .with_max_entries(self.disk_max_entries)
            .with_ttl(self.disk_ttl)
    }

    /// Reject budgets the caches cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.memory_max_items == 0 {
            return Err(Error::Config("memory_max_items must be greater than 0".into()));
        }
        if self.memory_max_bytes == 0 {
            return Err(Error::Config("memory_max_bytes must be greater than 0".into()));
        }
        if self.disk_max_entries == 0 {
            return Err(Error::Config("disk_max_entries must be greater than 0".into()));
        }
        if self.enable_preload && self.preload_workers == 0 {
            return Err(Error::Config(
                "preload_workers must be greater than 0 when preload is enabled".into(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(Error::Config("cleanup_interval must be greater than 0".into()));
        }
        Ok(())
    }
}

fn seconds<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::new("/tmp/media");

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/media"));
        assert_eq!(config.memory_max_items, 1000);
        assert_eq!(config.memory_max_bytes, 100 * 1024 * 1024);
        assert_eq!(config.disk_max_entries, 10_000);
        assert_eq!(config.memory_ttl, config.disk_ttl);
        assert_eq!(config.cleanup_interval, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_budgets() {
        assert!(CacheConfig::default().with_memory_max_items(0).validate().is_err());
        assert!(CacheConfig::default().with_memory_max_bytes(0).validate().is_err());
        assert!(CacheConfig::default().with_disk_max_entries(0).validate().is_err());
        assert!(CacheConfig::default().with_preload_workers(0).validate().is_err());
        assert!(CacheConfig::default()
            .with_preload(false)
            .with_preload_workers(0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_deserialize_partial_document() {
        let config: CacheConfig = serde_json::from_str(
            r#"{"cache_dir": "/data/cache", "memory_max_items": 50, "disk_ttl": 60, "enable_preload": false}"#,
        )
        .unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/data/cache"));
        assert_eq!(config.memory_max_items, 50);
        assert_eq!(config.disk_ttl, Duration::from_secs(60));
        assert_eq!(config.memory_ttl, DEFAULT_MEMORY_TTL);
        assert!(!config.enable_preload);
    }

    #[test]
    fn test_disk_config() {
        let disk = CacheConfig::default()
            .with_disk_max_entries(5)
            .with_disk_ttl(Duration::from_secs(9))
            .disk_config();

        assert_eq!(disk.max_entries, 5);
        assert_eq!(disk.ttl, Duration::from_secs(9));
    }
}
