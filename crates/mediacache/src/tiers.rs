//! Memory and disk tiers shared by the manager and the preload workers

use mediastore::DiskStore;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::memory::MemoryCache;
use crate::weigh::Weigh;

pub(crate) struct Tiers<V, C> {
    pub(crate) memory: MemoryCache<V>,
    pub(crate) disk: DiskStore,
    pub(crate) codec: C,
}

impl<V, C> Tiers<V, C>
where
    V: Weigh + Clone,
    C: Codec<V>,
{
    /// Read and decode a disk entry. Undecodable entries are evicted.
    pub(crate) fn load_from_disk(&self, key: &str) -> Option<V> {
        let bytes = self.disk.get(key)?;

        match self.codec.decode(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Evicting undecodable disk entry");
                self.disk.remove(key);
                None
            }
        }
    }

    /// Copy a disk value into memory. Failure only costs a future disk read.
    pub(crate) fn promote(&self, key: &str, value: V) {
        if self.memory.put(key, value) {
            debug!(key, "Promoted disk entry to memory");
        } else {
            debug!(key, "Disk entry too large to promote");
        }
    }
}
