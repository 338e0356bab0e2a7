//! CacheManager: memory tier in front of the disk tier

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use mediastore::DiskStore;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::Codec;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::history::AccessHistory;
use crate::memory::MemoryCache;
use crate::preload::{PreloadStats, Preloader, RelatedKeys, SharedToken};
use crate::stats::MemoryStats;
use crate::tiers::Tiers;
use crate::weigh::Weigh;

/// Options for [`CacheManager::put_with`]
#[derive(Debug, Clone)]
pub struct PutOptions {
    /// Tags stored with the entry in both tiers
    pub tags: Vec<String>,
    /// Also write the entry to disk
    pub persistent: bool,
    /// Free-form metadata kept in the disk index
    pub metadata: Option<serde_json::Value>,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            persistent: true,
            metadata: None,
        }
    }
}

impl PutOptions {
    /// Keep the entry in memory only
    pub fn memory_only() -> Self {
        Self {
            persistent: false,
            ..Self::default()
        }
    }

    /// Attach tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Attach index metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Entries removed by one expiry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Expired memory entries evicted
    pub memory: usize,
    /// Expired disk entries evicted
    pub disk: usize,
}

impl CleanupReport {
    /// Entries removed across both tiers
    pub fn total(&self) -> usize {
        self.memory + self.disk
    }
}

/// Point-in-time view of the disk tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskStats {
    /// Indexed entries
    pub size: usize,
    /// Entry budget
    pub max_size: usize,
    /// Sum of blob sizes in bytes
    pub total_bytes: u64,
    /// Disk time-to-live in seconds
    pub ttl_secs: u64,
    /// Cache directory
    pub cache_dir: PathBuf,
}

/// Point-in-time view of the whole cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerStats {
    /// Memory tier
    pub memory: MemoryStats,
    /// Disk tier
    pub disk: DiskStats,
    /// Preloader
    pub preload: PreloadStats,
    /// Keys with a recorded access history
    pub access_patterns: usize,
}

/// Background expiry thread and the channels used to stop it
struct Cleaner {
    stop: Sender<()>,
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Two-tier cache: memory in front of a directory-backed disk store
///
/// Reads try memory, then disk (promoting hits), then an optional loader.
/// Writes go to memory and, when persistent, through to disk. Hits schedule
/// related keys for background promotion.
///
/// No threads run until [`start`](Self::start) or the first preload. Call
/// [`stop`](Self::stop) before dropping to bound shutdown; `Drop` calls it
/// too.
pub struct CacheManager<V, C>
where
    V: Weigh + Clone + Send + 'static,
    C: Codec<V> + 'static,
{
    tiers: Arc<Tiers<V, C>>,
    history: AccessHistory,
    preloader: Preloader<V, C>,
    config: CacheConfig,
    cleaner: Mutex<Option<Cleaner>>,
    stopped: AtomicBool,
}

impl<V, C> CacheManager<V, C>
where
    V: Weigh + Clone + Send + 'static,
    C: Codec<V> + 'static,
{
    /// Open the cache directory, relating keys by shared tokens
    ///
    /// # Arguments
    /// * `config` - Budgets, TTLs and directory
    /// * `codec` - Converts payloads to disk bytes
    ///
    /// # Returns
    /// * `Result<CacheManager>` - Fails on invalid config or an unusable directory
    pub fn open(config: CacheConfig, codec: C) -> Result<Self> {
        Self::open_with_strategy(config, codec, SharedToken)
    }

    /// Open the cache directory with a custom relatedness strategy
    pub fn open_with_strategy<R>(config: CacheConfig, codec: C, strategy: R) -> Result<Self>
    where
        R: RelatedKeys + 'static,
    {
        config.validate()?;

        let disk = DiskStore::open(&config.cache_dir, config.disk_config())?;
        let memory = MemoryCache::new(
            config.memory_max_items,
            config.memory_max_bytes,
            config.memory_ttl,
        );
        let tiers = Arc::new(Tiers {
            memory,
            disk,
            codec,
        });

        let preloader = Preloader::new(
            Arc::clone(&tiers),
            Box::new(strategy),
            config.enable_preload,
            config.preload_workers,
            config.preload_fanout,
        );

        info!(
            cache_dir = %config.cache_dir.display(),
            memory_items = config.memory_max_items,
            memory_bytes = config.memory_max_bytes,
            disk_entries = config.disk_max_entries,
            preload = config.enable_preload,
            "Cache manager opened"
        );

        Ok(Self {
            tiers,
            history: AccessHistory::new(config.history_len),
            preloader,
            config,
            cleaner: Mutex::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    /// Start the background expiry thread. Does nothing if already running.
    pub fn start(&self) -> Result<()> {
        let mut cleaner = self.cleaner.lock();
        if cleaner.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);
        let tiers = Arc::clone(&self.tiers);
        let interval = self.config.cleanup_interval;

        let handle = thread::Builder::new()
            .name("mediacache-cleanup".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let report = sweep(&tiers);
                            if report.total() > 0 {
                                info!(
                                    memory = report.memory,
                                    disk = report.disk,
                                    "Expired cache entries removed"
                                );
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                let _ = done_tx.send(());
            })
            .map_err(Error::Spawn)?;

        *cleaner = Some(Cleaner {
            stop: stop_tx,
            done: done_rx,
            handle,
        });
        self.preloader.reopen();
        self.stopped.store(false, Ordering::Release);

        info!(interval_secs = interval.as_secs(), "Cache cleanup thread started");
        Ok(())
    }

    /// Look up a key in memory, then on disk
    pub fn get(&self, key: &str) -> Option<V> {
        self.history.record(key);

        if let Some(value) = self.tiers.memory.get(key) {
            self.preloader.schedule(key, &self.history);
            return Some(value);
        }

        if let Some(value) = self.tiers.load_from_disk(key) {
            debug!(key, "Disk cache hit");
            self.tiers.promote(key, value.clone());
            self.preloader.schedule(key, &self.history);
            return Some(value);
        }

        debug!(key, "Cache miss");
        None
    }

    /// Look up a key, falling back to `loader` and caching what it returns
    ///
    /// Loader errors are logged and reported as a miss.
    pub fn get_with<F, E>(&self, key: &str, loader: F) -> Option<V>
    where
        F: FnOnce() -> std::result::Result<Option<V>, E>,
        E: Display,
    {
        if let Some(value) = self.get(key) {
            return Some(value);
        }

        match loader() {
            Ok(Some(value)) => {
                self.put(key, value.clone());
                Some(value)
            }
            Ok(None) => {
                debug!(key, "Loader produced no value");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Loader failed");
                None
            }
        }
    }

    /// Store in memory and on disk, without tags
    pub fn put(&self, key: &str, value: V) -> bool {
        self.put_with(key, value, PutOptions::default())
    }

    /// Store a value
    ///
    /// # Returns
    /// * `bool` - True when at least one tier accepted the value
    pub fn put_with(&self, key: &str, value: V, options: PutOptions) -> bool {
        let PutOptions {
            tags,
            persistent,
            metadata,
        } = options;

        let bytes = if persistent {
            match self.tiers.codec.encode(&value) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(key, error = %e, "Payload not encodable, skipping disk tier");
                    None
                }
            }
        } else {
            None
        };

        let in_memory = self.tiers.memory.put_with(key, value, None, tags.clone());
        let on_disk = match bytes {
            Some(bytes) => self.tiers.disk.put(key, &bytes, tags, metadata),
            None => false,
        };

        if persistent && in_memory != on_disk {
            warn!(key, in_memory, on_disk, "Value stored in one tier only");
        }
        in_memory || on_disk
    }

    /// Remove a key from both tiers
    ///
    /// # Returns
    /// * `bool` - True if either tier held the key
    pub fn remove(&self, key: &str) -> bool {
        let in_memory = self.tiers.memory.remove(key);
        let on_disk = self.tiers.disk.remove(key);
        self.history.forget(key);

        debug!(key, in_memory, on_disk, "Cache entry removed");
        in_memory || on_disk
    }

    /// Empty both tiers and the access history
    pub fn clear(&self) {
        self.tiers.memory.clear();
        self.tiers.disk.clear();
        self.history.clear();
        info!("Cache cleared");
    }

    /// Evict expired entries from both tiers now
    pub fn cleanup(&self) -> CleanupReport {
        sweep(&self.tiers)
    }

    /// Check for a live entry in either tier without counting an access
    pub fn contains(&self, key: &str) -> bool {
        self.tiers.memory.contains(key) || self.tiers.disk.contains(key)
    }

    /// Snapshot of both tiers and the preloader
    pub fn stats(&self) -> ManagerStats {
        let disk = &self.tiers.disk;

        ManagerStats {
            memory: self.tiers.memory.stats(),
            disk: DiskStats {
                size: disk.len(),
                max_size: disk.max_entries(),
                total_bytes: disk.total_size(),
                ttl_secs: disk.ttl().as_secs(),
                cache_dir: disk.dir().to_path_buf(),
            },
            preload: self.preloader.stats(),
            access_patterns: self.history.len(),
        }
    }

    /// Memory tier
    pub fn memory(&self) -> &MemoryCache<V> {
        &self.tiers.memory
    }

    /// Disk tier
    pub fn disk(&self) -> &DiskStore {
        &self.tiers.disk
    }

    /// Configuration in effect
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Stop background work and flush the disk index
    ///
    /// Waits at most `stop_timeout` for the cleanup thread, then drains and
    /// joins the preload workers. Safe to call more than once.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(cleaner) = self.cleaner.lock().take() {
            let _ = cleaner.stop.send(());
            match cleaner.done.recv_timeout(self.config.stop_timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if cleaner.handle.join().is_err() {
                        warn!("Cache cleanup thread panicked");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        timeout_secs = self.config.stop_timeout.as_secs(),
                        "Cache cleanup thread did not stop in time, detaching"
                    );
                }
            }
        }

        self.preloader.close();

        if let Err(e) = self.tiers.disk.flush() {
            warn!(error = %e, "Failed to flush disk index on stop");
        }
        info!("Cache manager stopped");
    }
}

impl<V, C> Drop for CacheManager<V, C>
where
    V: Weigh + Clone + Send + 'static,
    C: Codec<V> + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}

fn sweep<V, C>(tiers: &Tiers<V, C>) -> CleanupReport
where
    V: Weigh + Clone,
    C: Codec<V>,
{
    CleanupReport {
        memory: tiers.memory.cleanup(),
        disk: tiers.disk.cleanup_expired(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Utf8Codec;
    use std::time::Duration;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> CacheManager<String, Utf8Codec> {
        let config = CacheConfig::new(dir.path()).with_preload(false);
        CacheManager::open(config, Utf8Codec).unwrap()
    }

    #[test]
    fn test_put_writes_through() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir);

        assert!(cache.put("k", "v".to_string()));
        assert!(cache.memory().contains("k"));
        assert!(cache.disk().contains("k"));
    }

    #[test]
    fn test_memory_only_put() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir);

        assert!(cache.put_with("k", "v".to_string(), PutOptions::memory_only()));
        assert!(cache.memory().contains("k"));
        assert!(!cache.disk().contains("k"));
    }

    #[test]
    fn test_disk_hit_promotes() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir);

        cache.put("k", "v".to_string());
        cache.memory().remove("k");

        assert_eq!(cache.get("k").as_deref(), Some("v"));
        assert!(cache.memory().contains("k"));
    }

    #[test]
    fn test_oversized_value_still_persists() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig::new(dir.path())
            .with_preload(false)
            .with_memory_max_bytes(4);
        let cache: CacheManager<String, Utf8Codec> = CacheManager::open(config, Utf8Codec).unwrap();

        assert!(cache.put("big", "123456789".to_string()));
        assert!(!cache.memory().contains("big"));
        assert!(cache.disk().contains("big"));

        assert!(!cache.put_with("big2", "123456789".to_string(), PutOptions::memory_only()));
    }

    #[test]
    fn test_undecodable_disk_entry_is_evicted() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir);

        cache.disk().put("bad", &[0xff, 0xfe], Vec::new(), None);

        assert!(cache.get("bad").is_none());
        assert!(!cache.disk().contains("bad"));
    }

    #[test]
    fn test_get_with_loader() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir);

        let loaded = cache.get_with("k", || Ok::<_, String>(Some("fresh".to_string())));
        assert_eq!(loaded.as_deref(), Some("fresh"));
        assert!(cache.disk().contains("k"));

        let missing = cache.get_with("none", || Ok::<_, String>(None));
        assert!(missing.is_none());

        let failed = cache.get_with("err", || Err::<Option<String>, _>("vendor down"));
        assert!(failed.is_none());
        assert!(!cache.contains("err"));
    }

    #[test]
    fn test_loader_not_called_on_hit() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir);

        cache.put("k", "cached".to_string());
        let value = cache.get_with("k", || -> std::result::Result<Option<String>, String> {
            panic!("loader must not run on a hit")
        });
        assert_eq!(value.as_deref(), Some("cached"));
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir);

        cache.put("a", "1".to_string());
        cache.put("b", "2".to_string());
        cache.get("a");

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert!(cache.get("a").is_none());

        cache.clear();
        assert!(cache.memory().is_empty());
        assert!(cache.disk().is_empty());
        assert_eq!(cache.stats().access_patterns, 0);
    }

    #[test]
    fn test_stats() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir);

        cache.put("a", "12345".to_string());
        cache.get("a");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.memory.size, 1);
        assert_eq!(stats.memory.hits, 1);
        assert_eq!(stats.disk.size, 1);
        assert_eq!(stats.disk.total_bytes, 5);
        assert_eq!(stats.disk.cache_dir, dir.path());
        assert!(!stats.preload.enabled);
        assert_eq!(stats.access_patterns, 2);
    }

    #[test]
    fn test_cleanup_thread_sweeps() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig::new(dir.path())
            .with_preload(false)
            .with_memory_ttl(Duration::from_millis(20))
            .with_disk_ttl(Duration::ZERO)
            .with_cleanup_interval(Duration::from_millis(30));
        let cache: CacheManager<String, Utf8Codec> = CacheManager::open(config, Utf8Codec).unwrap();

        cache.put("k", "v".to_string());
        cache.start().unwrap();
        cache.start().unwrap();

        std::thread::sleep(Duration::from_millis(200));
        assert!(cache.memory().is_empty());
        assert!(cache.disk().is_empty());

        cache.stop();
        cache.stop();
    }

    #[test]
    fn test_stop_flushes_index() {
        let dir = TempDir::new().unwrap();
        {
            let cache = manager(&dir);
            cache.put("k", "persisted".to_string());
            cache.stop();
        }

        let cache = manager(&dir);
        assert_eq!(cache.get("k").as_deref(), Some("persisted"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig::new(dir.path()).with_memory_max_items(0);

        let result: Result<CacheManager<String, Utf8Codec>> = CacheManager::open(config, Utf8Codec);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
