//! The `JobStore` contract: transactional CRUD on [`Job`] records.
//!
//! Implementations (see `job-engine-postgres`) must guarantee that every
//! mutation below commits fully or not at all, and that a `get` never
//! observes a partially-applied mutation from another caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::job::Job;

/// Outcome of finalising a failed attempt, decided by the store transactionally
/// (it alone knows the current `attempt`/`max_retries` under a row lock).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Retries remain; caller should compute backoff and re-enqueue.
    Retrying { attempt: i32 },
    /// No retries remain; job is now FAILED.
    Failed,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a brand new job. Fails if `id` already exists.
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Fetch a job by id.
    async fn get(&self, id: Uuid) -> Result<Option<Job>>;

    /// Step 5 of the worker loop: bump `attempt`, enter RUNNING, clear the
    /// previous attempt's terminal fields. Returns the updated job (the
    /// worker needs `payload`/`job_type` to invoke the handler, and the
    /// refreshed `attempt` to decide retries later).
    async fn mark_running(&self, id: Uuid) -> Result<Option<Job>>;

    /// Step 7 (success branch): record the result and enter SUCCESS.
    async fn mark_succeeded(&self, id: Uuid, result: serde_json::Value) -> Result<()>;

    /// Step 7 (failure branch): record `error`, and transactionally decide
    /// RETRYING vs FAILED based on `attempt <= max_retries`.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<FailureOutcome>;

    /// Step 4: an unregistered job type is immediately terminal, bypassing
    /// the retry budget entirely.
    async fn mark_unsupported_type(&self, id: Uuid, job_type: &str) -> Result<()>;

    /// Reaper transition: RUNNING -> RETRYING. Does not touch `attempt`.
    async fn mark_reaped_retrying(&self, id: Uuid) -> Result<()>;

    /// Reaper transition: RUNNING -> FAILED (no retries left).
    async fn mark_reaped_failed(&self, id: Uuid) -> Result<()>;

    /// Jobs stuck in RUNNING since before `cutoff`, for the reaper's scan.
    async fn query_stuck(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>>;
}
