//! On-disk index format
//!
//! Directory layout:
//! ```text
//! <cache_dir>/
//!   index.json                 key -> DiskIndexEntry, pretty printed
//!   <sha256(key)>.cache        one blob per live key
//! ```
//!
//! The index is the only source of truth for which blobs are live. Blob
//! files without an index entry are never read.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Name of the index document inside the cache directory
pub const INDEX_FILE: &str = "index.json";

/// Extension of blob files
pub const BLOB_EXTENSION: &str = "cache";

/// In-memory copy of the index document
pub type IndexMap = BTreeMap<String, DiskIndexEntry>;

/// Metadata for one persisted cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskIndexEntry {
    /// Blob file name, relative to the cache directory
    pub filename: String,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// Last disk hit (or write)
    pub accessed_at: DateTime<Utc>,
    /// Number of disk hits, starting at 1 on write
    pub access_count: u64,
    /// Blob size in bytes
    pub size: u64,
    /// Caller supplied tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Caller supplied metadata snapshot
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl DiskIndexEntry {
    /// Create a fresh entry for a blob that was just written
    pub fn new(
        key: &str,
        size: u64,
        tags: Vec<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            filename: blob_filename(key),
            created_at: now,
            accessed_at: now,
            access_count: 1,
            size,
            tags,
            metadata,
        }
    }

    /// Age of the entry at `now`; zero if the clock went backwards
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// True once the entry is at least `ttl` old
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) >= ttl
    }

    /// Record a disk hit
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.accessed_at = now;
        self.access_count += 1;
    }
}

/// Blob file name for a key: hex SHA-256 of the key plus extension.
///
/// Derived from the key, never the payload, so rewriting a key reuses its file.
pub fn blob_filename(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{}.{}", hex::encode(digest), BLOB_EXTENSION)
}

/// Load the index document. A missing file is an empty index.
pub fn load(path: &Path) -> Result<IndexMap> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(IndexMap::new()),
        Err(e) => return Err(Error::io(path, e)),
    };

    serde_json::from_slice(&raw).map_err(|e| Error::index(path, e))
}

/// Rewrite the whole index document.
///
/// Writes a sibling temp file and renames it over the index so a crash
/// mid-write never leaves a truncated document behind.
pub fn save(path: &Path, index: &IndexMap) -> Result<()> {
    let encoded = serde_json::to_vec_pretty(index).map_err(|e| Error::index(path, e))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &encoded).map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;

    Ok(())
}
