//! Per-key access history feeding the preloader

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use parking_lot::Mutex;

use crate::preload::RelatedKeys;

/// Recent access timestamps per key, bounded per key
pub struct AccessHistory {
    max_len: usize,
    keys: Mutex<BTreeMap<String, VecDeque<Instant>>>,
}

impl AccessHistory {
    /// Keep at most `max_len` timestamps per key
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
            keys: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record an access to `key` now
    pub fn record(&self, key: &str) {
        let mut keys = self.keys.lock();
        let times = keys.entry(key.to_string()).or_default();

        if times.len() == self.max_len {
            times.pop_front();
        }
        times.push_back(Instant::now());
    }

    /// Drop the history of one key
    pub fn forget(&self, key: &str) {
        self.keys.lock().remove(key);
    }

    /// Drop every history
    pub fn clear(&self) {
        self.keys.lock().clear();
    }

    /// Number of accesses recorded for `key`
    pub fn count(&self, key: &str) -> usize {
        self.keys.lock().get(key).map_or(0, VecDeque::len)
    }

    /// Number of keys with a history
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    /// Check if no key has a history
    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }

    /// Up to `limit` other keys with a history that `strategy` relates to `key`
    ///
    /// Candidates are visited in key order so the choice is stable.
    pub fn related(&self, key: &str, strategy: &dyn RelatedKeys, limit: usize) -> Vec<String> {
        self.keys
            .lock()
            .keys()
            .filter(|other| other.as_str() != key && strategy.is_related(key, other))
            .take(limit)
            .cloned()
            .collect()
    }
}
