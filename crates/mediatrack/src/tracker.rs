//! TaskTracker: polls remote jobs until they reach a terminal state

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;
use crate::error::TrackError;
use crate::snapshot::{TaskSnapshot, TaskStatus};
use crate::source::{FetchError, ProgressCallback, TaskStatusSource};

/// How a background tracking task ended
type Outcome = Arc<Mutex<Option<Result<TaskStatus, String>>>>;

/// Bookkeeping for one background-tracked task
struct TrackedTask {
    generation: u64,
    cancel: CancellationToken,
    has_callback: bool,
    handle: JoinHandle<()>,
    outcome: Outcome,
}

/// Introspection view of a background-tracked task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingStatus {
    /// The tracking task has not finished
    pub is_running: bool,
    /// Stop was requested
    pub is_cancelled: bool,
    /// A progress callback is attached
    pub has_callback: bool,
    /// Set once tracking returned a terminal snapshot
    pub completed: Option<bool>,
    /// Set once tracking failed
    pub error: Option<String>,
}

/// Source and timing shared with spawned tracking tasks
struct Poller<S> {
    source: S,
    config: TrackerConfig,
}

impl<S: TaskStatusSource> Poller<S> {
    async fn track(
        &self,
        task_id: &str,
        callback: Option<&dyn ProgressCallback>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<TaskSnapshot, TrackError> {
        let started = Instant::now();
        info!(task_id, timeout_secs = timeout.as_secs(), "Tracking task");

        loop {
            if cancel.is_cancelled() {
                debug!(task_id, "Tracking cancelled");
                return Err(TrackError::Cancelled(task_id.to_string()));
            }

            match self.source.fetch_status(task_id).await {
                Ok(snapshot) => {
                    if let Some(callback) = callback {
                        if let Err(e) = callback.on_progress(&snapshot).await {
                            error!(task_id, error = %e, "Progress callback failed");
                        }
                    }

                    debug!(
                        task_id,
                        status = %snapshot.status,
                        progress = snapshot.progress,
                        estimated_seconds = ?snapshot.estimated_seconds,
                        "Task progress"
                    );

                    match snapshot.status {
                        TaskStatus::Completed => {
                            info!(task_id, "Task completed");
                            return Ok(snapshot);
                        }
                        TaskStatus::Failed => {
                            error!(
                                task_id,
                                error = snapshot.error_message.as_deref().unwrap_or("unknown error"),
                                "Task failed"
                            );
                            return Ok(snapshot);
                        }
                        TaskStatus::Cancelled => {
                            warn!(task_id, "Task was cancelled remotely");
                            return Ok(snapshot);
                        }
                        TaskStatus::Pending | TaskStatus::Processing => {}
                    }
                }
                Err(FetchError::NotFound) => {
                    error!(task_id, "Task not found");
                    return Err(TrackError::NotFound(task_id.to_string()));
                }
                Err(FetchError::Fatal(message)) => {
                    error!(task_id, error = %message, "Status fetch failed");
                    return Err(TrackError::Source {
                        task_id: task_id.to_string(),
                        message,
                    });
                }
                Err(FetchError::Transient(message)) => {
                    warn!(task_id, error = %message, "Status fetch failed, will retry");
                }
            }

            let waited = started.elapsed();
            if waited > timeout {
                error!(task_id, waited_secs = waited.as_secs(), "Tracking timed out");
                return Err(TrackError::Timeout {
                    task_id: task_id.to_string(),
                    waited,
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(task_id, "Tracking cancelled");
                    return Err(TrackError::Cancelled(task_id.to_string()));
                }
                _ = time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}

/// Tracks remote jobs by polling a [`TaskStatusSource`]
///
/// Supports awaiting one task, fire-and-forget background tracking with a
/// callback, bulk waits and cancellation. Background operations must be
/// called from within a tokio runtime.
pub struct TaskTracker<S> {
    poller: Arc<Poller<S>>,
    tracked: Arc<Mutex<HashMap<String, TrackedTask>>>,
    next_generation: AtomicU64,
}

impl<S> TaskTracker<S>
where
    S: TaskStatusSource + 'static,
{
    /// Create a tracker with default timing
    pub fn new(source: S) -> Self {
        Self::with_config(source, TrackerConfig::default())
    }

    /// Create a tracker with custom timing
    pub fn with_config(source: S, config: TrackerConfig) -> Self {
        Self {
            poller: Arc::new(Poller { source, config }),
            tracked: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Timing in effect
    pub fn config(&self) -> TrackerConfig {
        self.poller.config
    }

    /// Poll one task until it reaches a terminal state
    ///
    /// # Arguments
    /// * `task_id` - Job to track
    /// * `callback` - Invoked with every snapshot, terminal one included
    /// * `timeout` - Defaults to `max_wait`
    ///
    /// # Returns
    /// * `Result<TaskSnapshot, TrackError>` - Terminal snapshot; failed and
    ///   cancelled jobs are snapshots, not errors
    pub async fn track_task(
        &self,
        task_id: &str,
        callback: Option<Arc<dyn ProgressCallback>>,
        timeout: Option<Duration>,
    ) -> Result<TaskSnapshot, TrackError> {
        self.track_task_until(task_id, callback, timeout, &CancellationToken::new())
            .await
    }

    /// Like [`track_task`](Self::track_task), stopping early when `cancel` fires
    pub async fn track_task_until(
        &self,
        task_id: &str,
        callback: Option<Arc<dyn ProgressCallback>>,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<TaskSnapshot, TrackError> {
        let timeout = timeout.unwrap_or(self.poller.config.max_wait);
        self.poller
            .track(task_id, callback.as_deref(), timeout, cancel)
            .await
    }

    /// Track a task on a spawned tokio task
    ///
    /// # Returns
    /// * `bool` - False if the task was already being tracked
    pub fn start_background_tracking(
        &self,
        task_id: &str,
        callback: Option<Arc<dyn ProgressCallback>>,
    ) -> bool {
        // held across spawn so the task cannot finish before it is registered
        let mut tracked = self.tracked.lock();
        if tracked.contains_key(task_id) {
            warn!(task_id, "Task is already being tracked");
            return false;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let outcome: Outcome = Arc::new(Mutex::new(None));
        let has_callback = callback.is_some();

        let handle = tokio::spawn({
            let poller = Arc::clone(&self.poller);
            let registry = Arc::clone(&self.tracked);
            let cancel = cancel.clone();
            let outcome = Arc::clone(&outcome);
            let task_id = task_id.to_string();

            async move {
                let max_wait = poller.config.max_wait;
                let result = poller
                    .track(&task_id, callback.as_deref(), max_wait, &cancel)
                    .await;

                match &result {
                    Ok(snapshot) => debug!(task_id = %task_id, status = %snapshot.status, "Background tracking finished"),
                    Err(e) => error!(task_id = %task_id, error = %e, "Background tracking failed"),
                }
                *outcome.lock() = Some(result.map(|s| s.status).map_err(|e| e.to_string()));

                let mut registry = registry.lock();
                if registry.get(&task_id).map(|t| t.generation) == Some(generation) {
                    registry.remove(&task_id);
                }
            }
        });

        tracked.insert(
            task_id.to_string(),
            TrackedTask {
                generation,
                cancel,
                has_callback,
                handle,
                outcome,
            },
        );

        info!(task_id, "Background tracking started");
        true
    }

    /// Cancel background tracking of a task and wait for it to wind down
    ///
    /// Does nothing if the task is not tracked.
    pub async fn stop_tracking(&self, task_id: &str) {
        let Some(task) = self.tracked.lock().remove(task_id) else {
            return;
        };

        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            warn!(task_id, error = %e, "Background tracking task panicked");
        }
        info!(task_id, "Background tracking stopped");
    }

    /// Stop every background tracking task
    pub async fn stop_all_tracking(&self) {
        let tasks: Vec<(String, TrackedTask)> = self.tracked.lock().drain().collect();
        let count = tasks.len();

        for (_, task) in &tasks {
            task.cancel.cancel();
        }
        for (task_id, task) in tasks {
            if let Err(e) = task.handle.await {
                warn!(task_id = %task_id, error = %e, "Background tracking task panicked");
            }
        }

        info!(count, "All background tracking stopped");
    }

    /// Number of tasks tracked in the background
    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().len()
    }

    /// Check whether a task is tracked in the background
    pub fn is_tracking(&self, task_id: &str) -> bool {
        self.tracked.lock().contains_key(task_id)
    }

    /// State of every background-tracked task
    pub fn tracking_status(&self) -> HashMap<String, TrackingStatus> {
        self.tracked
            .lock()
            .iter()
            .map(|(task_id, task)| {
                let (completed, error) = match &*task.outcome.lock() {
                    Some(Ok(_)) => (Some(true), None),
                    Some(Err(e)) => (None, Some(e.clone())),
                    None => (None, None),
                };

                let status = TrackingStatus {
                    is_running: !task.handle.is_finished(),
                    is_cancelled: task.cancel.is_cancelled(),
                    has_callback: task.has_callback,
                    completed,
                    error,
                };
                (task_id.clone(), status)
            })
            .collect()
    }

    /// Track several tasks concurrently until all finish or `timeout` elapses
    ///
    /// Tasks whose tracking errors are reported as failed snapshots, so the
    /// map holds one entry per requested id. When `timeout` (default
    /// `max_wait`) elapses first, every tracker is cancelled and awaited and
    /// [`TrackError::Timeout`] is returned instead of partial results.
    pub async fn wait_for_completion<I, T>(
        &self,
        task_ids: I,
        timeout: Option<Duration>,
    ) -> Result<HashMap<String, TaskSnapshot>, TrackError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let task_ids: Vec<String> = task_ids.into_iter().map(Into::into).collect();
        let timeout = timeout.unwrap_or(self.poller.config.max_wait);
        let started = Instant::now();
        info!(count = task_ids.len(), "Waiting for tasks to complete");

        let group = CancellationToken::new();
        let mut trackers = JoinSet::new();
        for task_id in task_ids.iter().cloned().collect::<HashSet<_>>() {
            let poller = Arc::clone(&self.poller);
            let cancel = group.child_token();

            trackers.spawn(async move {
                // per-task ceiling is max_wait; the group timeout applies on top
                let max_wait = poller.config.max_wait;
                let result = poller.track(&task_id, None, max_wait, &cancel).await;
                (task_id, result)
            });
        }

        let mut results = HashMap::with_capacity(task_ids.len());
        let collect = async {
            while let Some(joined) = trackers.join_next().await {
                match joined {
                    Ok((task_id, Ok(snapshot))) => {
                        results.insert(task_id, snapshot);
                    }
                    Ok((task_id, Err(e))) => {
                        error!(task_id = %task_id, error = %e, "Task tracking failed");
                        let snapshot = TaskSnapshot::failed(task_id.clone(), e.to_string());
                        results.insert(task_id, snapshot);
                    }
                    Err(e) => warn!(error = %e, "Tracking task panicked"),
                }
            }
        };

        if time::timeout(timeout, collect).await.is_err() {
            group.cancel();
            while trackers.join_next().await.is_some() {}

            let pending: Vec<&str> = task_ids
                .iter()
                .filter(|id| !results.contains_key(*id))
                .map(String::as_str)
                .collect();
            error!(pending = ?pending, "Timed out waiting for tasks");
            return Err(TrackError::Timeout {
                task_id: pending.join(", "),
                waited: started.elapsed(),
            });
        }

        for task_id in &task_ids {
            if !results.contains_key(task_id) {
                results.insert(
                    task_id.clone(),
                    TaskSnapshot::failed(task_id.clone(), "tracking task panicked"),
                );
            }
        }

        info!(count = results.len(), "Finished waiting for tasks");
        Ok(results)
    }
}
