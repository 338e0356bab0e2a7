//! Error types for mediacache

use std::io;

use thiserror::Error;

/// Result type alias for mediacache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced when building or configuring a cache
///
/// Lookups and writes never return these; they log and report a miss or
/// `false` instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Disk tier could not be opened or flushed
    #[error(transparent)]
    Store(#[from] mediastore::Error),

    /// Background thread could not be started
    #[error("Failed to spawn cache thread: {0}")]
    Spawn(#[source] io::Error),

    /// Invalid configuration value
    #[error("Invalid cache configuration: {0}")]
    Config(String),
}
