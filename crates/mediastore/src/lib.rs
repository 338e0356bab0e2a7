//! # mediastore
//!
//! Persistent tier of the media cache.
//!
//! ## Layout
//! - **index.json**: key -> entry metadata (timestamps, size, tags)
//! - **<sha256>.cache**: one opaque blob per key
//!
//! ## Guarantees
//! - Single writer: all index mutations go through one lock
//! - Entry count limit with oldest-by-access eviction
//! - Fixed-age expiry (default 1 hour)
//! - Stale index entries self-heal on access
//! - I/O failures degrade to a miss, never a panic or an error on the cache path

#![warn(missing_docs)]

mod config;
mod error;
pub mod index;
mod store;

pub use config::{DiskConfig, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
pub use error::{Error, Result};
pub use index::DiskIndexEntry;
pub use store::DiskStore;
