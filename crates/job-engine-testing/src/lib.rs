//! In-memory `JobStore` and `WorkQueue` fakes for testing worker/reaper
//! wiring and HTTP submission handlers without a live Postgres or Redis.
//!
//! Mirrors the shape of the real implementations closely enough that a test
//! swapping `InMemoryJobStore`/`InMemoryWorkQueue` in for
//! `job-engine-postgres`/`job-engine-queue-redis` exercises the same call
//! sequence a production worker would make.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use job_engine_core::{EngineError, FailureOutcome, Job, JobState, JobStore, Result, WorkQueue};
use tokio::sync::Notify;
use uuid::Uuid;

/// `JobStore` backed by a `DashMap`, for single-process test scenarios.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<Uuid, Job>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot a job's current record, for test assertions.
    pub fn get_sync(&self, id: Uuid) -> Option<Job> {
        self.jobs.get(&id).map(|entry| entry.value().clone())
    }

    pub fn all_jobs(&self) -> Vec<Job> {
        self.jobs.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        if self.jobs.contains_key(&job.id) {
            return Err(EngineError::Store(anyhow::anyhow!(
                "job {} already exists",
                job.id
            )));
        }
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.get_sync(id))
    }

    async fn mark_running(&self, id: Uuid) -> Result<Option<Job>> {
        let Some(mut job) = self.jobs.get_mut(&id) else {
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
        let mut job = self
            .jobs
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
        let mut job = self
            .jobs
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
        let mut job = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| EngineError::Store(anyhow::anyhow!("job {id} not found")))?;
        job.state = JobState::Failed;
        job.last_error = Some(format!("Unsupported job type: {job_type}"));
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_reaped_retrying(&self, id: Uuid) -> Result<()> {
        let mut job = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| EngineError::Store(anyhow::anyhow!("job {id} not found")))?;
        job.state = JobState::Retrying;
        job.last_error = Some("Worker timeout detected; requeued".to_string());
        Ok(())
    }

    async fn mark_reaped_failed(&self, id: Uuid) -> Result<()> {
        let mut job = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| EngineError::Store(anyhow::anyhow!("job {id} not found")))?;
        job.state = JobState::Failed;
        job.last_error = Some("Worker timeout detected; no retries left".to_string());
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn query_stuck(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>> {
        Ok(self
            .jobs
            .iter()
            .filter(|entry| {
                let job = entry.value();
                job.state == JobState::Running
                    && job.started_at.map(|s| s < cutoff).unwrap_or(false)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }
}

/// `WorkQueue` backed by a `Mutex<VecDeque>` plus a `DashMap` of lock
/// holders, for single-process test scenarios.
#[derive(Default)]
pub struct InMemoryWorkQueue {
    pending: Mutex<VecDeque<Uuid>>,
    locks: DashMap<Uuid, String>,
    notify: Notify,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_locked(&self, job_id: Uuid) -> bool {
        self.locks.contains_key(&job_id)
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
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
        match self.locks.entry(job_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(holder.to_string());
                Ok(true)
            }
        }
    }

    async fn release_lock(&self, job_id: Uuid) -> Result<()> {
        self.locks.remove(&job_id);
        Ok(())
    }
}
