//! Cache statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Lock-free counters for memory tier performance tracking
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    inserts: AtomicU64,
    rejections: AtomicU64,
}

impl CacheStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an eviction
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an insert
    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an item rejected for exceeding the byte budget
    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get total misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get total evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get total inserts
    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Get total rejections
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Point-in-time view of the memory tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    /// Live entries
    pub size: usize,
    /// Entry count budget
    pub max_size: usize,
    /// Bytes accounted to live entries
    pub byte_usage: usize,
    /// Byte budget
    pub max_bytes: usize,
    /// `byte_usage` as a percentage of `max_bytes`
    pub usage_percent: f64,
    /// Total hits
    pub hits: u64,
    /// Total misses (absent or expired)
    pub misses: u64,
    /// Hit ratio (0.0 to 1.0)
    pub hit_rate: f64,
    /// Entries evicted to make room
    pub evictions: u64,
    /// Items rejected for exceeding the byte budget
    pub rejections: u64,
    /// Memory time-to-live in seconds
    pub ttl_secs: u64,
}

impl MemoryStats {
    pub(crate) fn collect(
        counters: &CacheStats,
        size: usize,
        max_size: usize,
        byte_usage: usize,
        max_bytes: usize,
        ttl: Duration,
    ) -> Self {
        let usage_percent = if max_bytes == 0 {
            0.0
        } else {
            byte_usage as f64 / max_bytes as f64 * 100.0
        };

        Self {
            size,
            max_size,
            byte_usage,
            max_bytes,
            usage_percent,
            hits: counters.hits(),
            misses: counters.misses(),
            hit_rate: counters.hit_ratio(),
            evictions: counters.evictions(),
            rejections: counters.rejections(),
            ttl_secs: ttl.as_secs(),
        }
    }
}
