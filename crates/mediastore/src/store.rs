//! Disk tier implementation
//!
//! One JSON index plus one blob file per key. Every index mutation happens
//! under a single lock, which also serializes the whole-file index rewrite.
//! I/O failures on the cache path are logged and degrade to a miss or a
//! no-op; only `open` and `flush` report them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::DiskConfig;
use crate::error::{Error, Result};
use crate::index::{self, blob_filename, DiskIndexEntry, IndexMap, INDEX_FILE};

/// Directory-backed persistent cache tier
pub struct DiskStore {
    /// Cache directory holding the index and the blobs
    dir: PathBuf,

    /// Path of `index.json`
    index_path: PathBuf,

    /// Count and age limits
    config: DiskConfig,

    /// In-memory copy of the index; the lock is the single-writer guard
    index: Mutex<IndexMap>,
}

impl DiskStore {
    /// Open or create a disk tier in the given directory
    ///
    /// # Arguments
    /// * `dir` - Cache directory (created if missing)
    /// * `config` - Entry count and TTL limits
    ///
    /// # Returns
    /// * `Result<DiskStore>` - Store handle; an unreadable index starts empty
    pub fn open<P: AsRef<Path>>(dir: P, config: DiskConfig) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

        let index_path = dir.join(INDEX_FILE);
        let index = match index::load(&index_path) {
            Ok(index) => index,
            Err(e) => {
                error!(path = %index_path.display(), error = %e, "Failed to load disk cache index, starting empty");
                IndexMap::new()
            }
        };

        info!(
            dir = %dir.display(),
            entries = index.len(),
            max_entries = config.max_entries,
            ttl_secs = config.ttl.as_secs(),
            "Disk cache opened"
        );

        Ok(Self {
            dir,
            index_path,
            config,
            index: Mutex::new(index),
        })
    }

    /// Read a blob by key
    ///
    /// Stale index entries (blob missing) are deleted, expired entries are
    /// evicted, unreadable blobs are evicted. All of these return `None`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut index = self.index.lock();
        let entry = index.get(key)?;

        let now = Utc::now();
        if entry.is_expired(now, self.config.ttl) {
            debug!(key, age_secs = entry.age(now).as_secs(), "Disk cache entry expired");
            self.evict_locked(&mut index, key);
            self.persist_locked(&index);
            return None;
        }

        let path = self.dir.join(&entry.filename);
        match fs::read(&path) {
            Ok(bytes) => {
                if let Some(entry) = index.get_mut(key) {
                    entry.touch(now);
                }
                self.persist_locked(&index);
                Some(bytes)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(key, path = %path.display(), "Disk cache blob missing, dropping index entry");
                index.remove(key);
                self.persist_locked(&index);
                None
            }
            Err(e) => {
                error!(key, path = %path.display(), error = %e, "Failed to read disk cache blob");
                self.evict_locked(&mut index, key);
                self.persist_locked(&index);
                None
            }
        }
    }

    /// Write a blob and its index entry
    ///
    /// # Arguments
    /// * `key` - Cache key
    /// * `bytes` - Encoded payload
    /// * `tags` - Tags stored in the index
    /// * `metadata` - Optional metadata snapshot stored in the index
    ///
    /// # Returns
    /// * `bool` - False if the write failed (logged); the key is then absent
    pub fn put(
        &self,
        key: &str,
        bytes: &[u8],
        tags: Vec<String>,
        metadata: Option<serde_json::Value>,
    ) -> bool {
        match self.try_put(key, bytes, tags, metadata) {
            Ok(evicted) => {
                if evicted > 0 {
                    debug!(key, evicted, "Disk cache over entry limit, evicted oldest");
                }
                true
            }
            Err(e) => {
                error!(key, error = %e, "Failed to write disk cache entry");
                false
            }
        }
    }

    fn try_put(
        &self,
        key: &str,
        bytes: &[u8],
        tags: Vec<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<usize> {
        let filename = blob_filename(key);
        let path = self.dir.join(&filename);

        let mut index = self.index.lock();
        fs::write(&path, bytes).map_err(|e| Error::io(&path, e))?;

        index.insert(
            key.to_string(),
            DiskIndexEntry::new(key, bytes.len() as u64, tags, metadata),
        );
        let evicted = self.enforce_limit_locked(&mut index);

        if let Err(e) = index::save(&self.index_path, &index) {
            // the blob was rewritten in place, so an older value is gone too
            index.remove(key);
            self.delete_blob(&filename);
            return Err(e);
        }
        Ok(evicted)
    }

    /// Remove a key and its blob
    ///
    /// # Returns
    /// * `bool` - True if the key was indexed
    pub fn remove(&self, key: &str) -> bool {
        let mut index = self.index.lock();
        let removed = self.evict_locked(&mut index, key);
        if removed {
            self.persist_locked(&index);
        }
        removed
    }

    /// Remove every entry and blob
    pub fn clear(&self) {
        let mut index = self.index.lock();
        for entry in index.values() {
            self.delete_blob(&entry.filename);
        }
        index.clear();
        self.persist_locked(&index);
        info!(dir = %self.dir.display(), "Disk cache cleared");
    }

    /// Evict every entry older than the disk TTL
    ///
    /// # Returns
    /// * `usize` - Number of entries evicted
    pub fn cleanup_expired(&self) -> usize {
        let mut index = self.index.lock();
        let now = Utc::now();

        let expired: Vec<String> = index
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, self.config.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.evict_locked(&mut index, key);
        }

        if !expired.is_empty() {
            self.persist_locked(&index);
            debug!(count = expired.len(), "Disk cache expired entries evicted");
        }

        expired.len()
    }

    /// Check whether a live (unexpired) entry is indexed for the key
    pub fn contains(&self, key: &str) -> bool {
        self.index
            .lock()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(Utc::now(), self.config.ttl))
    }

    /// Index entry for a key, without touching it
    pub fn entry(&self, key: &str) -> Option<DiskIndexEntry> {
        self.index.lock().get(key).cloned()
    }

    /// Snapshot of the whole index, ordered by key
    pub fn entries(&self) -> Vec<(String, DiskIndexEntry)> {
        self.index
            .lock()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Write the index to disk
    pub fn flush(&self) -> Result<()> {
        let index = self.index.lock();
        index::save(&self.index_path, &index)
    }

    /// Number of indexed entries
    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.index.lock().is_empty()
    }

    /// Sum of indexed blob sizes in bytes
    pub fn total_size(&self) -> u64 {
        self.index.lock().values().map(|entry| entry.size).sum()
    }

    /// Entry count limit
    pub fn max_entries(&self) -> usize {
        self.config.max_entries
    }

    /// Disk time-to-live
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn enforce_limit_locked(&self, index: &mut IndexMap) -> usize {
        if index.len() <= self.config.max_entries {
            return 0;
        }

        let mut by_access: Vec<(String, chrono::DateTime<Utc>)> = index
            .iter()
            .map(|(key, entry)| (key.clone(), entry.accessed_at))
            .collect();
        by_access.sort_by(|a, b| a.1.cmp(&b.1));

        let excess = index.len() - self.config.max_entries;
        for (key, _) in by_access.into_iter().take(excess) {
            self.evict_locked(index, &key);
        }

        excess
    }

    /// Drop an index entry and its blob. Blob deletion failures are logged.
    fn evict_locked(&self, index: &mut IndexMap, key: &str) -> bool {
        match index.remove(key) {
            Some(entry) => {
                self.delete_blob(&entry.filename);
                true
            }
            None => false,
        }
    }

    fn delete_blob(&self, filename: &str) {
        let path = self.dir.join(filename);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to delete disk cache blob");
            }
        }
    }

    fn persist_locked(&self, index: &IndexMap) {
        if let Err(e) = index::save(&self.index_path, index) {
            error!(error = %e, "Failed to save disk cache index");
        }
    }
}

impl std::fmt::Debug for DiskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskStore")
            .field("dir", &self.dir)
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish()
    }
}
