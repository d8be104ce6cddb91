//! Engine-wide error type.
//!
//! Store and queue implementations live in separate crates and wrap their
//! own transport errors (`sqlx::Error`, `redis::RedisError`, ...) into these
//! variants so the worker and reaper loops can log and retry without caring
//! which backend is underneath.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("job store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("work queue error: {0}")]
    Queue(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
