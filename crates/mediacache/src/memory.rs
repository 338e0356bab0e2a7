//! Memory tier: LRU ordering with TTL expiry and a byte budget

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::lru::LruList;
use crate::stats::{CacheStats, MemoryStats};
use crate::weigh::Weigh;

/// A cached payload with its bookkeeping
struct CacheEntry<V> {
    payload: V,
    created_at: Instant,
    accessed_at: Instant,
    access_count: u64,
    size: usize,
    tags: BTreeSet<String>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) >= ttl
    }
}

/// Read-only description of a live entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    /// Cache key
    pub key: String,
    /// Seconds since insertion
    pub age_secs: f64,
    /// Seconds since last hit
    pub idle_secs: f64,
    /// Hits since insertion
    pub access_count: u64,
    /// Bytes charged against the budget
    pub size: usize,
    /// Tags supplied at insertion
    pub tags: Vec<String>,
}

/// Everything guarded by the cache lock
struct Inner<V> {
    entries: LruList<String, CacheEntry<V>>,
    byte_usage: usize,
}

impl<V> Inner<V> {
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.byte_usage -= entry.size;
        Some(entry)
    }
}

/// In-process LRU cache bounded by entry count and bytes, with TTL expiry
///
/// All reads and writes go through one lock; counters are atomics so
/// `stats()` never blocks writers for long.
pub struct MemoryCache<V> {
    inner: Mutex<Inner<V>>,
    stats: CacheStats,
    max_items: usize,
    max_bytes: usize,
    ttl: Duration,
}

impl<V> MemoryCache<V>
where
    V: Weigh + Clone,
{
    /// Create a new memory cache
    ///
    /// # Arguments
    /// * `max_items` - Maximum number of entries (must be > 0)
    /// * `max_bytes` - Maximum sum of entry sizes
    /// * `ttl` - Age after which an entry is treated as a miss
    pub fn new(max_items: usize, max_bytes: usize, ttl: Duration) -> Self {
        assert!(max_items > 0, "Capacity must be greater than 0");

        Self {
            inner: Mutex::new(Inner {
                entries: LruList::with_capacity(max_items.min(4096)),
                byte_usage: 0,
            }),
            stats: CacheStats::new(),
            max_items,
            max_bytes,
            ttl,
        }
    }

    /// Get a payload, refreshing its recency
    ///
    /// Expired entries are evicted and counted as misses.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let expired = match inner.entries.peek(key) {
            Some(entry) => entry.is_expired(now, self.ttl),
            None => {
                self.stats.record_miss();
                debug!(key, "Memory cache miss");
                return None;
            }
        };

        if expired {
            inner.remove_entry(key);
            self.stats.record_miss();
            debug!(key, "Memory cache entry expired");
            return None;
        }

        let entry = inner.entries.get_mut(key)?;
        entry.accessed_at = now;
        entry.access_count += 1;
        self.stats.record_hit();
        debug!(key, access_count = entry.access_count, "Memory cache hit");

        Some(entry.payload.clone())
    }

    /// Insert a payload sized by [`Weigh`], without tags
    pub fn put(&self, key: &str, value: V) -> bool {
        self.put_with(key, value, None, Vec::new())
    }

    /// Insert a payload
    ///
    /// # Arguments
    /// * `key` - Cache key; an existing entry is replaced
    /// * `value` - Payload
    /// * `size` - Bytes to charge; measured with [`Weigh`] when `None`
    /// * `tags` - Tags for [`find_by_tag`](Self::find_by_tag)
    ///
    /// # Returns
    /// * `bool` - False if the payload alone exceeds the byte budget
    pub fn put_with(&self, key: &str, value: V, size: Option<usize>, tags: Vec<String>) -> bool {
        let size = size.unwrap_or_else(|| value.weigh());

        if size > self.max_bytes {
            self.stats.record_rejection();
            warn!(key, size, max_bytes = self.max_bytes, "Item exceeds memory cache budget");
            return false;
        }

        let mut inner = self.inner.lock();
        inner.remove_entry(key);

        while !inner.entries.is_empty()
            && (inner.entries.len() >= self.max_items
                || inner.byte_usage + size > self.max_bytes)
        {
            if let Some((evicted, entry)) = inner.entries.pop_lru() {
                inner.byte_usage -= entry.size;
                self.stats.record_eviction();
                debug!(key = %evicted, size = entry.size, "Memory cache evicted");
            }
        }

        let now = Instant::now();
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                payload: value,
                created_at: now,
                accessed_at: now,
                access_count: 0,
                size,
                tags: tags.into_iter().collect(),
            },
        );
        inner.byte_usage += size;
        self.stats.record_insert();

        debug!(
            key,
            size,
            total_items = inner.entries.len(),
            total_bytes = inner.byte_usage,
            "Memory cache stored"
        );
        true
    }

    /// Remove an entry
    ///
    /// # Returns
    /// * `bool` - True if the key was present
    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().remove_entry(key).is_some()
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.byte_usage = 0;
    }

    /// Evict every expired entry
    ///
    /// # Returns
    /// * `usize` - Number of entries evicted
    pub fn cleanup(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, self.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove_entry(key);
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "Memory cache expired entries evicted");
        }
        expired.len()
    }

    /// Check for a live entry without touching recency or counters
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .entries
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now(), self.ttl))
    }

    /// Keys carrying a tag, most recently used first
    pub fn find_by_tag(&self, tag: &str) -> Vec<String> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|(_, entry)| entry.tags.contains(tag))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Describe every live entry, most recently used first
    pub fn entries(&self) -> Vec<EntryInfo> {
        let inner = self.inner.lock();
        let now = Instant::now();

        inner
            .entries
            .iter()
            .map(|(key, entry)| EntryInfo {
                key: key.clone(),
                age_secs: now.saturating_duration_since(entry.created_at).as_secs_f64(),
                idle_secs: now.saturating_duration_since(entry.accessed_at).as_secs_f64(),
                access_count: entry.access_count,
                size: entry.size,
                tags: entry.tags.iter().cloned().collect(),
            })
            .collect()
    }

    /// Snapshot of sizes and counters
    pub fn stats(&self) -> MemoryStats {
        let inner = self.inner.lock();
        MemoryStats::collect(
            &self.stats,
            inner.entries.len(),
            self.max_items,
            inner.byte_usage,
            self.max_bytes,
            self.ttl,
        )
    }

    /// Raw counters
    pub fn counters(&self) -> &CacheStats {
        &self.stats
    }

    /// Get current number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Bytes charged to live entries
    pub fn byte_usage(&self) -> usize {
        self.inner.lock().byte_usage
    }

    /// Time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
