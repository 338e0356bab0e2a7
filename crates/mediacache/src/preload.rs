//! Speculative promotion of related keys from disk into memory
//!
//! A hit on one key schedules its relatives for promotion on a small worker
//! pool. Workers start on the first submission and drain their queue when
//! the preloader is closed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::history::AccessHistory;
use crate::tiers::Tiers;
use crate::weigh::Weigh;

/// Decides whether two keys are worth preloading together
pub trait RelatedKeys: Send + Sync {
    /// True if a hit on `a` suggests `b` will be requested soon
    fn is_related(&self, a: &str, b: &str) -> bool;
}

/// Keys are related when they share a token
///
/// Tokens are split on whitespace and `_`, so `cat_white` and `cat_black`
/// are related while `cat_white` and `dog_brown` are not.
#[derive(Debug, Default, Clone, Copy)]
pub struct SharedToken;

impl SharedToken {
    fn tokens(key: &str) -> impl Iterator<Item = &str> {
        key.split(|c: char| c.is_whitespace() || c == '_')
            .filter(|token| !token.is_empty())
    }
}

impl RelatedKeys for SharedToken {
    fn is_related(&self, a: &str, b: &str) -> bool {
        if a == b {
            return false;
        }
        let tokens: HashSet<&str> = Self::tokens(a).collect();
        Self::tokens(b).any(|token| tokens.contains(token))
    }
}

/// Point-in-time view of the preloader
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreloadStats {
    /// Hits schedule related keys
    pub enabled: bool,
    /// Keys queued or being promoted
    pub active_tasks: usize,
    /// Worker threads started
    pub workers: usize,
}

/// Removes a key from the pending set when a job ends, whatever the outcome
struct PendingGuard {
    pending: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.key);
    }
}

struct Pool {
    sender: Sender<PendingGuard>,
    workers: Vec<JoinHandle<()>>,
}

pub(crate) struct Preloader<V, C> {
    tiers: Arc<Tiers<V, C>>,
    strategy: Box<dyn RelatedKeys>,
    enabled: bool,
    worker_count: usize,
    fanout: usize,
    pending: Arc<Mutex<HashSet<String>>>,
    pool: Mutex<Option<Pool>>,
    closed: AtomicBool,
}

impl<V, C> Preloader<V, C>
where
    V: Weigh + Clone + Send + 'static,
    C: Codec<V> + 'static,
{
    pub(crate) fn new(
        tiers: Arc<Tiers<V, C>>,
        strategy: Box<dyn RelatedKeys>,
        enabled: bool,
        worker_count: usize,
        fanout: usize,
    ) -> Self {
        Self {
            tiers,
            strategy,
            enabled,
            worker_count,
            fanout,
            pending: Arc::new(Mutex::new(HashSet::new())),
            pool: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue relatives of `key` that are neither in memory nor already pending
    ///
    /// # Returns
    /// * `usize` - Number of keys queued
    pub(crate) fn schedule(&self, key: &str, history: &AccessHistory) -> usize {
        if !self.enabled || self.closed.load(Ordering::Acquire) {
            return 0;
        }

        let mut queued = 0;
        for related in history.related(key, self.strategy.as_ref(), self.fanout) {
            if self.tiers.memory.contains(&related) {
                continue;
            }
            if !self.pending.lock().insert(related.clone()) {
                continue;
            }

            // dropping an unsent guard clears the pending mark
            let guard = PendingGuard {
                pending: Arc::clone(&self.pending),
                key: related,
            };
            if self.submit(guard) {
                queued += 1;
            }
        }

        if queued > 0 {
            debug!(key, queued, "Scheduled related keys for preload");
        }
        queued
    }

    fn submit(&self, job: PendingGuard) -> bool {
        let mut pool = self.pool.lock();
        // checked under the pool lock so a concurrent close cannot be outrun
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        if pool.is_none() {
            *pool = self.spawn_pool();
        }

        match pool.as_ref() {
            Some(pool) => pool.sender.send(job).is_ok(),
            None => false,
        }
    }

    fn spawn_pool(&self) -> Option<Pool> {
        let (sender, receiver) = unbounded::<PendingGuard>();
        let mut workers = Vec::with_capacity(self.worker_count);

        for i in 0..self.worker_count {
            let tiers = Arc::clone(&self.tiers);
            let receiver = receiver.clone();

            match thread::Builder::new()
                .name(format!("mediacache-preload-{}", i))
                .spawn(move || Self::worker_loop(tiers, receiver))
            {
                Ok(handle) => workers.push(handle),
                Err(e) => warn!(error = %e, "Failed to spawn preload worker"),
            }
        }

        if workers.is_empty() {
            return None;
        }
        debug!(workers = workers.len(), "Preload workers started");
        Some(Pool { sender, workers })
    }

    fn worker_loop(tiers: Arc<Tiers<V, C>>, receiver: Receiver<PendingGuard>) {
        // ends once every sender is dropped and the queue is drained
        for job in receiver {
            let key = job.key.as_str();
            if tiers.memory.contains(key) {
                continue;
            }

            match tiers.load_from_disk(key) {
                Some(value) => {
                    tiers.promote(key, value);
                    debug!(key, "Preloaded");
                }
                None => debug!(key, "Preload skipped, not on disk"),
            }
        }
    }

    /// Stop accepting work, let workers drain the queue and join them
    pub(crate) fn close(&self) {
        let pool = {
            let mut pool = self.pool.lock();
            self.closed.store(true, Ordering::Release);
            pool.take()
        };
        let Some(pool) = pool else {
            return;
        };

        drop(pool.sender);
        for handle in pool.workers {
            if handle.join().is_err() {
                warn!("Preload worker panicked");
            }
        }
        debug!("Preload workers stopped");
    }

    /// Accept work again after `close`; workers respawn on the next submission
    pub(crate) fn reopen(&self) {
        let _pool = self.pool.lock();
        self.closed.store(false, Ordering::Release);
    }

    pub(crate) fn stats(&self) -> PreloadStats {
        PreloadStats {
            enabled: self.enabled && !self.closed.load(Ordering::Acquire),
            active_tasks: self.pending.lock().len(),
            workers: self.pool.lock().as_ref().map_or(0, |pool| pool.workers.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Utf8Codec;
    use crate::memory::MemoryCache;
    use mediastore::{DiskConfig, DiskStore};
    use std::time::Duration;
    use tempfile::TempDir;

    fn preloader(dir: &TempDir) -> Preloader<String, Utf8Codec> {
        let tiers = Arc::new(Tiers {
            memory: MemoryCache::new(10, 1024, Duration::from_secs(60)),
            disk: DiskStore::open(dir.path(), DiskConfig::default()).unwrap(),
            codec: Utf8Codec,
        });
        Preloader::new(tiers, Box::new(SharedToken), true, 2, 3)
    }

    fn job(preloader: &Preloader<String, Utf8Codec>, key: &str) -> PendingGuard {
        preloader.pending.lock().insert(key.to_string());
        PendingGuard {
            pending: Arc::clone(&preloader.pending),
            key: key.to_string(),
        }
    }

    #[test]
    fn test_submit_after_close_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        let preloader = preloader(&dir);

        preloader.close();
        assert!(!preloader.submit(job(&preloader, "cat_white")));
        assert_eq!(preloader.stats().workers, 0);
        assert_eq!(preloader.stats().active_tasks, 0);
        assert!(!preloader.stats().enabled);
    }

    #[test]
    fn test_reopen_accepts_work_again() {
        let dir = TempDir::new().unwrap();
        let preloader = preloader(&dir);

        assert!(preloader.submit(job(&preloader, "cat_white")));
        preloader.close();
        assert_eq!(preloader.stats().workers, 0);

        preloader.reopen();
        assert!(preloader.stats().enabled);
        assert!(preloader.submit(job(&preloader, "cat_black")));
        assert_eq!(preloader.stats().workers, 2);

        preloader.close();
        assert_eq!(preloader.stats().active_tasks, 0);
    }

    #[test]
    fn test_shared_token() {
        let strategy = SharedToken;

        assert!(strategy.is_related("cat_white", "cat_black"));
        assert!(strategy.is_related("a red car", "car_blue"));
        assert!(!strategy.is_related("cat_white", "dog_brown"));
        assert!(!strategy.is_related("cat", "cat"));
        assert!(!strategy.is_related("", "_"));
    }

    #[test]
    fn test_shared_token_is_symmetric() {
        let strategy = SharedToken;
        let keys = ["sunset beach", "beach_house", "house", "mountain lake"];

        for a in keys {
            for b in keys {
                assert_eq!(strategy.is_related(a, b), strategy.is_related(b, a));
            }
        }
    }
}
