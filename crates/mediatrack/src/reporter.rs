//! Progress callback that writes snapshots to the log

use async_trait::async_trait;
use tracing::{error, info};

use crate::snapshot::{TaskSnapshot, TaskStatus};
use crate::source::ProgressCallback;

/// Logs every snapshot it receives
///
/// Failures are logged at error level with the job's message; everything
/// else at info with progress and the remaining time estimate.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    name: String,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new("task_progress")
    }
}

impl ProgressReporter {
    /// Reporter whose log lines carry `reporter = name`
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Name attached to every log line
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl ProgressCallback for ProgressReporter {
    async fn on_progress(&self, snapshot: &TaskSnapshot) -> anyhow::Result<()> {
        match snapshot.status {
            TaskStatus::Failed => error!(
                reporter = %self.name,
                task_id = %snapshot.task_id,
                error = snapshot.error_message.as_deref().unwrap_or("unknown error"),
                "{}",
                snapshot
            ),
            _ => info!(
                reporter = %self.name,
                task_id = %snapshot.task_id,
                status = %snapshot.status,
                progress = snapshot.progress,
                estimated_seconds = ?snapshot.estimated_seconds,
                "{}",
                snapshot
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reporter_never_fails() {
        let reporter = ProgressReporter::default();
        assert_eq!(reporter.name(), "task_progress");

        let running = TaskSnapshot::new("T1", TaskStatus::Processing).with_progress(30);
        assert!(reporter.on_progress(&running).await.is_ok());
        assert!(reporter
            .on_progress(&TaskSnapshot::failed("T1", "quota"))
            .await
            .is_ok());
    }
}
