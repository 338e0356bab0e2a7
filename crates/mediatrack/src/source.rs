//! Seams to the job service and to progress listeners

use async_trait::async_trait;
use thiserror::Error;

use crate::snapshot::TaskSnapshot;

/// Why a status fetch failed
///
/// The tracker retries [`Transient`](FetchError::Transient) failures and
/// aborts on the others.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The service does not know the task; it will never appear
    #[error("task not found")]
    NotFound,

    /// Temporary failure such as a dropped connection or a 5xx
    #[error("transient failure: {0}")]
    Transient(String),

    /// Unexpected failure that retrying will not fix
    #[error("fatal failure: {0}")]
    Fatal(String),
}

/// Reports the current state of a remote job
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    /// Fetch the latest snapshot for `task_id`
    async fn fetch_status(&self, task_id: &str) -> Result<TaskSnapshot, FetchError>;
}

/// Receives every snapshot observed while tracking
///
/// Errors are logged by the tracker and never stop tracking.
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// Handle one snapshot
    async fn on_progress(&self, snapshot: &TaskSnapshot) -> anyhow::Result<()>;
}
