//! # Job Engine Core
//!
//! The distributed job lifecycle engine: the state machine each job
//! traverses, the at-most-one-concurrent-execution guarantee per job, the
//! retry-with-backoff policy, and the reaper's liveness protocol.
//!
//! This crate is intentionally agnostic to the concrete store and queue
//! transport - it defines the [`JobStore`] and [`WorkQueue`] contracts and
//! drives them via [`Worker`] and [`Reaper`]. See `job-engine-postgres` and
//! `job-engine-queue-redis` for production implementations, and
//! `job-engine-testing` for in-memory fakes suitable for tests.
//!
//! ## Architecture
//!
//! ```text
//! HTTP submission layer
//!     │ insert(PENDING) + enqueue(id)
//!     ▼
//! WorkQueue ───────────────── dequeue_blocking() ──────┐
//!                                                       ▼
//!                                                    Worker
//!                                                       │ acquire_lock, get, mark_running
//!                                                       ▼
//!                                               HandlerRegistry.get(type).execute(payload)
//!                                                       │ mark_succeeded / mark_failed
//!                                                       ▼
//!                                                   JobStore
//!                                                       ▲
//!                                      query_stuck(cutoff) │ mark_reaped_*
//!                                                    Reaper (out-of-band)
//! ```
//!
//! ## Key invariants
//!
//! 1. A job in SUCCESS or FAILED never transitions again.
//! 2. At most one worker holds the advisory lock for a given job at a time.
//! 3. `attempt` increments only in [`JobStore::mark_running`], never in the
//!    reaper's transitions - this keeps the bounded-retries law exact.
//! 4. An unregistered job type terminates immediately, bypassing the retry
//!    budget.

mod backoff;
mod error;
mod job;
mod queue;
mod reaper;
mod registry;
mod store;
mod worker;

pub use backoff::compute_delay_seconds;
pub use error::{EngineError, Result};
pub use job::{Job, JobState};
pub use queue::WorkQueue;
pub use reaper::{Reaper, ReaperConfig};
pub use registry::{Handler, HandlerRegistry};
pub use store::{FailureOutcome, JobStore};
pub use worker::{Worker, WorkerConfig};

pub use async_trait::async_trait;
