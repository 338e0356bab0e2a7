//! Error types for mediatrack

use std::time::Duration;

use thiserror::Error;

/// Why tracking ended without a terminal snapshot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
    /// The task did not reach a terminal state in time
    #[error("tracking {task_id} timed out after {}s", .waited.as_secs())]
    Timeout {
        /// Task (or comma separated tasks) still running
        task_id: String,
        /// Time spent before giving up
        waited: Duration,
    },

    /// The job service does not know the task
    #[error("task {0} not found")]
    NotFound(String),

    /// The job service failed in a way retrying will not fix
    #[error("status fetch for {task_id} failed: {message}")]
    Source {
        /// Task being tracked
        task_id: String,
        /// Failure description
        message: String,
    },

    /// Tracking was stopped before the task finished
    #[error("tracking {0} was cancelled")]
    Cancelled(String),
}

impl TrackError {
    /// True for timeouts, as opposed to task or service failures
    pub fn is_timeout(&self) -> bool {
        matches!(self, TrackError::Timeout { .. })
    }

    /// Task the error refers to
    pub fn task_id(&self) -> &str {
        match self {
            TrackError::Timeout { task_id, .. } | TrackError::Source { task_id, .. } => task_id,
            TrackError::NotFound(task_id) | TrackError::Cancelled(task_id) => task_id,
        }
    }
}
