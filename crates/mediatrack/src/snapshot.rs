//! Task status as reported by the job service

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of a remote job
///
/// `Pending -> Processing -> {Completed | Failed | Cancelled}`; the last three
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued, not started
    Pending,
    /// Running
    Processing,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Failed,
    /// Stopped before finishing
    Cancelled,
}

impl TaskStatus {
    /// True for states with no outgoing transition
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

/// One observation of a remote job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Job identifier
    pub task_id: String,
    /// Current state
    pub status: TaskStatus,
    /// Percent complete, 0 to 100
    pub progress: u8,
    /// Estimated seconds remaining
    pub estimated_seconds: Option<u64>,
    /// Failure description
    pub error_message: Option<String>,
    /// Job output, present once completed
    pub result: Option<Value>,
}

impl TaskSnapshot {
    /// Snapshot with no progress information
    pub fn new(task_id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            progress: 0,
            estimated_seconds: None,
            error_message: None,
            result: None,
        }
    }

    /// Failed snapshot standing in for a job whose tracking errored
    pub fn failed(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(task_id, TaskStatus::Failed).with_error(message)
    }

    /// Set progress, clamped to 100
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = progress.min(100);
        self
    }

    /// Set the remaining time estimate
    pub fn with_estimated_seconds(mut self, seconds: u64) -> Self {
        self.estimated_seconds = Some(seconds);
        self
    }

    /// Set the failure description
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Set the job output
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    /// True once the job can no longer change state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Build a snapshot from a job service status document
    ///
    /// Reads `task_id`, `status`, `task_info.{progress, estimated_time,
    /// error_message}` and `result`. Unknown statuses read as pending and a
    /// result is only kept for completed jobs.
    pub fn from_api_value(value: &Value) -> Self {
        let task_id = value
            .get("task_id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(TaskStatus::Pending);

        let mut snapshot = Self::new(task_id, status);

        if let Some(info) = value.get("task_info") {
            let progress = info.get("progress").and_then(Value::as_u64).unwrap_or(0);
            snapshot.progress = progress.min(100) as u8;
            snapshot.estimated_seconds = info.get("estimated_time").and_then(Value::as_u64);
            snapshot.error_message = info
                .get("error_message")
                .and_then(Value::as_str)
                .map(str::to_string);
        }

        if status == TaskStatus::Completed {
            snapshot.result = value.get("result").cloned();
        }

        snapshot
    }
}

impl fmt::Display for TaskSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            TaskStatus::Completed => write!(f, "Task {}: completed", self.task_id),
            TaskStatus::Failed => write!(
                f,
                "Task {}: failed - {}",
                self.task_id,
                self.error_message.as_deref().unwrap_or("unknown error")
            ),
            TaskStatus::Cancelled => write!(f, "Task {}: cancelled", self.task_id),
            TaskStatus::Pending | TaskStatus::Processing => {
                write!(f, "Task {}: {}% complete", self.task_id, self.progress)?;
                if let Some(seconds) = self.estimated_seconds {
                    write!(f, ", about {}s remaining", seconds)?;
                }
                Ok(())
            }
        }
    }
}
