//! End-to-end coverage of the worker and reaper loops against in-memory
//! fakes, exercising the scenarios from the lifecycle's testable properties:
//! a clean run, a transient failure that recovers, exhausted retries, and
//! reaper reclaim of an abandoned RUNNING job.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{InMemoryQueue, InMemoryStore};
use job_engine_core::{
    Handler, HandlerRegistry, Job, JobState, JobStore, Reaper, ReaperConfig, Worker, WorkerConfig,
    WorkQueue,
};
use tokio_util::sync::CancellationToken;

struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn execute(
        &self,
        payload: &serde_json::Value,
    ) -> std::result::Result<Option<serde_json::Value>, String> {
        Ok(Some(payload.clone()))
    }
}

/// Fails its first `fail_times` invocations, then succeeds.
struct FlakyHandler {
    fail_times: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl Handler for FlakyHandler {
    async fn execute(
        &self,
        payload: &serde_json::Value,
    ) -> std::result::Result<Option<serde_json::Value>, String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_times {
            Err("transient failure".to_string())
        } else {
            Ok(Some(payload.clone()))
        }
    }
}

struct AlwaysFailsHandler;

#[async_trait]
impl Handler for AlwaysFailsHandler {
    async fn execute(
        &self,
        _payload: &serde_json::Value,
    ) -> std::result::Result<Option<serde_json::Value>, String> {
        Err("boom".to_string())
    }
}

fn fast_worker_config() -> WorkerConfig {
    WorkerConfig {
        backoff_cap_seconds: 0.0,
        max_concurrent_jobs: 4,
        ..WorkerConfig::default()
    }
}

async fn run_until_terminal(
    worker: Arc<Worker<InMemoryStore, InMemoryQueue>>,
    store: Arc<InMemoryStore>,
    job_id: uuid::Uuid,
) -> Job {
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(worker.clone().run(shutdown.clone()));

    for _ in 0..200 {
        let job = store.snapshot(job_id);
        if job.state.is_terminal() {
            shutdown.cancel();
            handle.await.unwrap();
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.cancel();
    handle.await.unwrap();
    panic!("job {job_id} never reached a terminal state");
}

#[tokio::test]
async fn echo_job_succeeds_on_first_attempt() {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());
    let mut registry = HandlerRegistry::new();
    registry.register("echo", Arc::new(EchoHandler));
    let registry = Arc::new(registry);

    let job = Job::new("echo", serde_json::json!({"message": "hi"}), 3, 1.0);
    let job_id = job.id;
    store.insert(&job).await.unwrap();
    queue.enqueue(job_id).await.unwrap();

    let worker = Arc::new(Worker::with_config(
        store.clone(),
        queue.clone(),
        registry,
        fast_worker_config(),
    ));

    let finished = run_until_terminal(worker, store, job_id).await;

    assert_eq!(finished.state, JobState::Success);
    assert_eq!(finished.attempt, 1);
    assert_eq!(finished.result, Some(serde_json::json!({"message": "hi"})));
    assert!(finished.last_error.is_none());
    let duration = finished.duration_seconds.expect("duration recorded");
    assert!(duration >= 0.0);
}

#[tokio::test]
async fn transient_failure_recovers_on_retry() {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());
    let mut registry = HandlerRegistry::new();
    registry.register(
        "flaky",
        Arc::new(FlakyHandler {
            fail_times: 1,
            calls: AtomicUsize::new(0),
        }),
    );
    let registry = Arc::new(registry);

    let job = Job::new("flaky", serde_json::json!({}), 2, 0.0);
    let job_id = job.id;
    store.insert(&job).await.unwrap();
    queue.enqueue(job_id).await.unwrap();

    let worker = Arc::new(Worker::with_config(
        store.clone(),
        queue.clone(),
        registry,
        fast_worker_config(),
    ));

    let finished = run_until_terminal(worker, store, job_id).await;

    assert_eq!(finished.state, JobState::Success);
    assert_eq!(finished.attempt, 2);
}

#[tokio::test]
async fn exhausted_retries_lands_in_failed() {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());
    let mut registry = HandlerRegistry::new();
    registry.register("always_fails", Arc::new(AlwaysFailsHandler));
    let registry = Arc::new(registry);

    let job = Job::new("always_fails", serde_json::json!({}), 1, 0.0);
    let job_id = job.id;
    store.insert(&job).await.unwrap();
    queue.enqueue(job_id).await.unwrap();

    let worker = Arc::new(Worker::with_config(
        store.clone(),
        queue.clone(),
        registry,
        fast_worker_config(),
    ));

    let finished = run_until_terminal(worker, store, job_id).await;

    assert_eq!(finished.state, JobState::Failed);
    assert_eq!(finished.attempt, 2); // initial attempt + one retry
    assert_eq!(finished.last_error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn unregistered_job_type_fails_immediately_without_consuming_retries() {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());
    let registry = Arc::new(HandlerRegistry::new());

    let job = Job::new("unknown_type", serde_json::json!({}), 5, 1.0);
    let job_id = job.id;
    store.insert(&job).await.unwrap();
    queue.enqueue(job_id).await.unwrap();

    let worker = Arc::new(Worker::with_config(
        store.clone(),
        queue.clone(),
        registry,
        fast_worker_config(),
    ));

    let finished = run_until_terminal(worker, store, job_id).await;

    assert_eq!(finished.state, JobState::Failed);
    assert_eq!(finished.attempt, 0);
    assert!(finished
        .last_error
        .as_deref()
        .unwrap()
        .contains("unknown_type"));
}

#[tokio::test]
async fn reaper_reclaims_stuck_running_job_with_retries_left() {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());

    let mut job = Job::new("echo", serde_json::json!({}), 3, 1.0);
    job.attempt = 1;
    job.state = JobState::Running;
    job.started_at = Some(Utc::now() - chrono::Duration::seconds(300));
    let job_id = job.id;
    store.insert(&job).await.unwrap();

    let reaper = Reaper::with_config(
        store.clone(),
        queue.clone(),
        ReaperConfig {
            running_timeout: Duration::from_secs(120),
            scan_interval: Duration::from_secs(5),
        },
    );

    reaper.scan_once().await.unwrap();

    let reclaimed = store.snapshot(job_id);
    assert_eq!(reclaimed.state, JobState::Retrying);
    assert_eq!(queue.depth(), 1);
    assert_eq!(
        queue.dequeue_blocking().await.unwrap(),
        job_id
    );
}

#[tokio::test]
async fn reaper_fails_stuck_running_job_with_no_retries_left() {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());

    let mut job = Job::new("echo", serde_json::json!({}), 1, 1.0);
    job.attempt = 2; // already exhausted its one retry
    job.state = JobState::Running;
    job.started_at = Some(Utc::now() - chrono::Duration::seconds(300));
    let job_id = job.id;
    store.insert(&job).await.unwrap();

    let reaper = Reaper::with_config(
        store.clone(),
        queue.clone(),
        ReaperConfig {
            running_timeout: Duration::from_secs(120),
            scan_interval: Duration::from_secs(5),
        },
    );

    reaper.scan_once().await.unwrap();

    let reclaimed = store.snapshot(job_id);
    assert_eq!(reclaimed.state, JobState::Failed);
    assert_eq!(queue.depth(), 0);
}

#[tokio::test]
async fn reaper_ignores_running_jobs_within_timeout() {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());

    let mut job = Job::new("echo", serde_json::json!({}), 3, 1.0);
    job.attempt = 1;
    job.state = JobState::Running;
    job.started_at = Some(Utc::now());
    let job_id = job.id;
    store.insert(&job).await.unwrap();

    let reaper = Reaper::with_config(
        store.clone(),
        queue.clone(),
        ReaperConfig {
            running_timeout: Duration::from_secs(120),
            scan_interval: Duration::from_secs(5),
        },
    );

    reaper.scan_once().await.unwrap();

    let untouched = store.snapshot(job_id);
    assert_eq!(untouched.state, JobState::Running);
    assert_eq!(queue.depth(), 0);
}
