//! Minimal in-memory `JobStore`/`WorkQueue` fakes for exercising the worker
//! and reaper loops without a live Postgres/Redis. The production-grade
//! equivalents (with the same trait surface) live in `job-engine-testing`;
//! these are deliberately standalone to avoid a dev-dependency cycle.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use job_engine_core::{EngineError, FailureOutcome, Job, JobState, JobStore, Result, WorkQueue};
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, id: Uuid) -> Job {
        self.jobs.lock().unwrap().get(&id).cloned().unwrap()
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(EngineError::Store(anyhow::anyhow!(
                "job {} already exists",
                job.id
            )));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn mark_running(&self, id: Uuid) -> Result<Option<Job>> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        job.attempt += 1;
        job.state = JobState::Running;
        job.started_at = Some(Utc::now());
        job.finished_at = None;
        job.duration_seconds = None;
        job.last_error = None;
        Ok(Some(job.clone()))
    }

    async fn mark_succeeded(&self, id: Uuid, result: serde_json::Value) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| EngineError::Store(anyhow::anyhow!("job {id} not found")))?;
        let now = Utc::now();
        job.state = JobState::Success;
        job.result = Some(result);
        job.finished_at = Some(now);
        job.duration_seconds = job
            .started_at
            .map(|started| (now - started).num_milliseconds() as f64 / 1000.0);
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<FailureOutcome> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| EngineError::Store(anyhow::anyhow!("job {id} not found")))?;
        let now = Utc::now();
        job.last_error = Some(error.to_string());
        job.finished_at = Some(now);
        job.duration_seconds = job
            .started_at
            .map(|started| (now - started).num_milliseconds() as f64 / 1000.0);

        if job.attempt <= job.max_retries {
            job.state = JobState::Retrying;
            Ok(FailureOutcome::Retrying {
                attempt: job.attempt,
            })
        } else {
            job.state = JobState::Failed;
            Ok(FailureOutcome::Failed)
        }
    }

    async fn mark_unsupported_type(&self, id: Uuid, job_type: &str) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| EngineError::Store(anyhow::anyhow!("job {id} not found")))?;
        job.state = JobState::Failed;
        job.last_error = Some(format!("Unsupported job type: {job_type}"));
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_reaped_retrying(&self, id: Uuid) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| EngineError::Store(anyhow::anyhow!("job {id} not found")))?;
        job.state = JobState::Retrying;
        job.last_error = Some("Worker timeout detected; requeued".to_string());
        Ok(())
    }

    async fn mark_reaped_failed(&self, id: Uuid) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| EngineError::Store(anyhow::anyhow!("job {id} not found")))?;
        job.state = JobState::Failed;
        job.last_error = Some("Worker timeout detected; no retries left".to_string());
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn query_stuck(&self, cutoff: chrono::DateTime<Utc>) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .values()
            .filter(|job| {
                job.state == JobState::Running
                    && job.started_at.map(|s| s < cutoff).unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryQueue {
    pending: Mutex<VecDeque<Uuid>>,
    locks: Mutex<HashMap<Uuid, String>>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

#[async_trait]
impl WorkQueue for InMemoryQueue {
    async fn enqueue(&self, job_id: Uuid) -> Result<()> {
        self.pending.lock().unwrap().push_back(job_id);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue_blocking(&self) -> Result<Uuid> {
        loop {
            if let Some(id) = self.pending.lock().unwrap().pop_front() {
                return Ok(id);
            }
            self.notify.notified().await;
        }
    }

    async fn acquire_lock(&self, job_id: Uuid, _ttl: Duration, holder: &str) -> Result<bool> {
        let mut locks = self.locks.lock().unwrap();
        if locks.contains_key(&job_id) {
            return Ok(false);
        }
        locks.insert(job_id, holder.to_string());
        Ok(true)
    }

    async fn release_lock(&self, job_id: Uuid) -> Result<()> {
        self.locks.lock().unwrap().remove(&job_id);
        Ok(())
    }
}
