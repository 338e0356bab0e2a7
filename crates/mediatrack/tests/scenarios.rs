use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mediatrack::{
    FetchError, ProgressReporter, TaskSnapshot, TaskStatus, TaskStatusSource, TaskTracker,
    TrackerConfig,
};
use parking_lot::Mutex;
use tokio::time::{self, Instant};

/// Status source replaying a script per task; the last step repeats
#[derive(Default)]
struct StubService {
    scripts: Mutex<HashMap<String, VecDeque<TaskSnapshot>>>,
    polls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
}

impl StubService {
    fn script(self, task_id: &str, steps: Vec<TaskSnapshot>) -> Self {
        self.scripts.lock().insert(task_id.to_string(), steps.into());
        self
    }

    fn polls(&self, task_id: &str) -> usize {
        self.polls.lock().get(task_id).copied().unwrap_or(0)
    }

    fn total_polls(&self) -> usize {
        self.polls.lock().values().sum()
    }
}

#[async_trait]
impl TaskStatusSource for StubService {
    async fn fetch_status(&self, task_id: &str) -> Result<TaskSnapshot, FetchError> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        *self.polls.lock().entry(task_id.to_string()).or_default() += 1;

        // simulate network latency
        time::sleep(Duration::from_millis(50)).await;

        let result = {
            let mut scripts = self.scripts.lock();
            match scripts.get_mut(task_id) {
                Some(script) if script.len() > 1 => script.pop_front().ok_or(FetchError::NotFound),
                Some(script) => script.front().cloned().ok_or(FetchError::NotFound),
                None => Err(FetchError::NotFound),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn processing(task_id: &str, progress: u8) -> TaskSnapshot {
    TaskSnapshot::new(task_id, TaskStatus::Processing).with_progress(progress)
}

fn completed(task_id: &str) -> TaskSnapshot {
    TaskSnapshot::new(task_id, TaskStatus::Completed)
        .with_progress(100)
        .with_result(serde_json::json!({"video_url": format!("https://cdn/{}.mp4", task_id)}))
}

#[tokio::test(start_paused = true)]
async fn track_task_returns_after_three_polls() {
    let service = Arc::new(StubService::default().script(
        "T1",
        vec![processing("T1", 10), processing("T1", 60), completed("T1")],
    ));
    let tracker = TaskTracker::new(SharedService(Arc::clone(&service)));

    let snapshot = tracker
        .track_task("T1", Some(Arc::new(ProgressReporter::default())), None)
        .await
        .unwrap();

    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(service.polls("T1"), 3);
    assert_eq!(snapshot.result.unwrap()["video_url"], "https://cdn/T1.mp4");
}

#[tokio::test(start_paused = true)]
async fn bulk_wait_times_out_and_cancels_stragglers() {
    let service = Arc::new(
        StubService::default()
            .script("T1", vec![completed("T1")])
            .script("T2", vec![processing("T2", 5)]),
    );
    let tracker = TaskTracker::with_config(SharedService(Arc::clone(&service)), TrackerConfig::default());

    let started = Instant::now();
    let err = tracker
        .wait_for_completion(["T1", "T2"], Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout());
    assert_eq!(err.task_id(), "T2");
    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_secs(6));
    assert_eq!(service.polls("T1"), 1);

    // no tracker keeps polling once the wait has returned
    assert_eq!(service.in_flight.load(Ordering::SeqCst), 0);
    let polls = service.total_polls();
    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(service.total_polls(), polls);
}

#[tokio::test(start_paused = true)]
async fn bulk_wait_reports_partial_failure() {
    let service = StubService::default()
        .script("T1", vec![processing("T1", 50), completed("T1")])
        .script("T2", vec![TaskSnapshot::failed("T2", "content policy")]);
    let tracker = TaskTracker::new(service);

    let results = tracker
        .wait_for_completion(vec!["T1".to_string(), "T2".into(), "missing".into()], None)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results["T1"].status, TaskStatus::Completed);
    assert_eq!(results["T2"].status, TaskStatus::Failed);
    assert_eq!(results["T2"].error_message.as_deref(), Some("content policy"));
    assert_eq!(results["missing"].status, TaskStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn background_tracking_reports_through_status() {
    let service = StubService::default().script(
        "T1",
        vec![processing("T1", 10), processing("T1", 60), completed("T1")],
    );
    let tracker = TaskTracker::new(service);

    assert!(tracker.start_background_tracking("T1", Some(Arc::new(ProgressReporter::new("renders")))));
    time::sleep(Duration::from_secs(1)).await;

    let status = tracker.tracking_status();
    assert!(status["T1"].is_running);
    assert!(status["T1"].has_callback);
    assert_eq!(status["T1"].completed, None);

    time::sleep(Duration::from_secs(15)).await;
    assert!(tracker.tracking_status().is_empty());
}

/// Lets a test keep a handle on the service the tracker owns
struct SharedService(Arc<StubService>);

#[async_trait]
impl TaskStatusSource for SharedService {
    async fn fetch_status(&self, task_id: &str) -> Result<TaskSnapshot, FetchError> {
        self.0.fetch_status(task_id).await
    }
}
