//! # mediacache
//!
//! Two-tier cache for generated media.
//!
//! ## Architecture
//! - **MemoryCache**: LRU list over an AHash map, bounded by entries and bytes, with TTL
//! - **DiskStore**: JSON index plus one blob per key (from `mediastore`)
//! - **CacheManager**: memory first, then disk with promotion, then an optional loader
//! - **Preloader**: hits promote related keys from disk on a small worker pool
//!
//! ## Usage
//! ```no_run
//! use mediacache::{CacheConfig, CacheManager, JsonCodec};
//!
//! let config = CacheConfig::new("/var/cache/media");
//! let cache: CacheManager<serde_json::Value, _> =
//!     CacheManager::open(config, JsonCodec::new()).unwrap();
//! cache.start().unwrap();
//!
//! cache.put("prompt_cat", serde_json::json!({"url": "https://cdn/cat.png"}));
//! assert!(cache.get("prompt_cat").is_some());
//!
//! cache.stop();
//! ```

#![warn(missing_docs)]

mod codec;
mod config;
mod error;
mod history;
mod lru;
mod manager;
mod memory;
mod preload;
mod stats;
mod tiers;
mod weigh;

pub use codec::{BytesCodec, Codec, CodecError, JsonCodec, Utf8Codec};
pub use config::{
    CacheConfig, DEFAULT_CLEANUP_INTERVAL, DEFAULT_MEMORY_BYTES, DEFAULT_MEMORY_ITEMS,
    DEFAULT_MEMORY_TTL,
};
pub use error::{Error, Result};
pub use history::AccessHistory;
pub use manager::{CacheManager, CleanupReport, DiskStats, ManagerStats, PutOptions};
pub use memory::{EntryInfo, MemoryCache};
pub use preload::{PreloadStats, RelatedKeys, SharedToken};
pub use stats::{CacheStats, MemoryStats};
pub use weigh::{serialized_weight, Weigh, DEFAULT_WEIGHT, SCALAR_WEIGHT};

pub use mediastore::{DiskConfig, DiskIndexEntry, DiskStore};
