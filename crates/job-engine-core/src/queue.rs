//! The `WorkQueue` contract: a FIFO of job ids plus advisory per-id locks.
//!
//! The queue carries no job state of its own - only identifiers - and
//! tolerates duplicate entries for the same id (see module docs on the
//! worker's post-lock state check, which neutralises stragglers).

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append `job_id` to the tail of the queue. Idempotent from the
    /// engine's perspective: duplicates are tolerated.
    async fn enqueue(&self, job_id: Uuid) -> Result<()>;

    /// Block until an entry is available, then remove and return it.
    async fn dequeue_blocking(&self) -> Result<Uuid>;

    /// Atomic set-if-absent with a TTL. Returns `true` iff `holder` now
    /// owns the lock.
    async fn acquire_lock(&self, job_id: Uuid, ttl: Duration, holder: &str) -> Result<bool>;

    /// Best-effort delete; safe to call on an already-expired lock.
    async fn release_lock(&self, job_id: Uuid) -> Result<()>;
}
