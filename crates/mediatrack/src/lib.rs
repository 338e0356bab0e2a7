//! # mediatrack
//!
//! Tracks long-running generation jobs (video renders and the like) by
//! polling the service that runs them.
//!
//! ## Features
//! - Await one task to a terminal state with a per-poll callback
//! - Background tracking with self-cleaning bookkeeping
//! - Bulk waits with a shared timeout that cancels stragglers
//! - Cooperative cancellation at every poll
//!
//! ## Usage
//! ```no_run
//! use async_trait::async_trait;
//! use mediatrack::{FetchError, TaskSnapshot, TaskStatus, TaskStatusSource, TaskTracker};
//!
//! struct Renders;
//!
//! #[async_trait]
//! impl TaskStatusSource for Renders {
//!     async fn fetch_status(&self, task_id: &str) -> Result<TaskSnapshot, FetchError> {
//!         Ok(TaskSnapshot::new(task_id, TaskStatus::Completed))
//!     }
//! }
//!
//! # async fn run() -> Result<(), mediatrack::TrackError> {
//! let tracker = TaskTracker::new(Renders);
//! let snapshot = tracker.track_task("T1", None, None).await?;
//! assert!(snapshot.is_terminal());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod reporter;
mod snapshot;
mod source;
mod tracker;

pub use config::{TrackerConfig, DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL};
pub use error::TrackError;
pub use reporter::ProgressReporter;
pub use snapshot::{TaskSnapshot, TaskStatus};
pub use source::{FetchError, ProgressCallback, TaskStatusSource};
pub use tracker::{TaskTracker, TrackingStatus};

pub use tokio_util::sync::CancellationToken;
