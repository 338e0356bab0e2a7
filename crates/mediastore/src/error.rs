//! Error types for mediastore

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for mediastore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for disk tier operations
///
/// Cache-path operations (`get`, `put`, `remove`, ...) log these and degrade
/// to a miss or a no-op. They only reach callers from `open` and `flush`.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on a blob or index file
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Index document could not be encoded or decoded
    #[error("Index error on {path}: {source}")]
    Index {
        /// Index file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn index(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Index {
            path: path.into(),
            source,
        }
    }

    /// True when the error is a missing file
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}
