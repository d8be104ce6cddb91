//! Redis implementation of the `job_engine_core::WorkQueue` contract.
//!
//! Uses two kinds of keys under a configurable queue name:
//! - `{queue}:pending` - a list holding job ids, FIFO via `LPUSH` / `BRPOP`.
//! - `lock:{queue}:{job_id}` - a string key set with `SET NX PX` acting as
//!   the advisory lock; its value is the holding worker's id so operators
//!   can inspect ownership, though release is a plain `DEL` rather than a
//!   compare-and-delete against that value. Lock correctness is carried by
//!   the TTL plus the worker's post-lock state check, not by the delete
//!   being conditional.

use async_trait::async_trait;
use job_engine_core::{EngineError, Result, WorkQueue};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

fn queue_err(context: &'static str, error: redis::RedisError) -> EngineError {
    EngineError::Queue(anyhow::anyhow!(error).context(context))
}

/// `WorkQueue` backed by a Redis list plus `SET NX PX` advisory locks.
///
/// Holds a `ConnectionManager`, which multiplexes and auto-reconnects
/// internally, so cloning the connection handle per call is cheap.
pub struct RedisWorkQueue {
    conn: Mutex<ConnectionManager>,
    queue_name: String,
}

impl Clone for RedisWorkQueue {
    fn clone(&self) -> Self {
        Self {
            conn: Mutex::new(self.conn.lock().unwrap().clone()),
            queue_name: self.queue_name.clone(),
        }
    }
}

impl RedisWorkQueue {
    pub fn new(conn: ConnectionManager, queue_name: impl Into<String>) -> Self {
        Self {
            conn: Mutex::new(conn),
            queue_name: queue_name.into(),
        }
    }

    pub async fn connect(redis_url: &str, queue_name: impl Into<String>) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn, queue_name))
    }

    fn pending_key(&self) -> String {
        format!("{}:pending", self.queue_name)
    }

    fn lock_key(&self, job_id: Uuid) -> String {
        format!("lock:{}:{job_id}", self.queue_name)
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn enqueue(&self, job_id: Uuid) -> Result<()> {
        self.conn()
            .lpush::<_, _, ()>(self.pending_key(), job_id.to_string())
            .await
            .map_err(|e| queue_err("enqueuing job id", e))?;
        Ok(())
    }

    async fn dequeue_blocking(&self) -> Result<Uuid> {
        // Timeout 0 means block indefinitely, matching the blocking-pop
        // contract; a dead connection surfaces as an error rather than
        // hanging forever, since ConnectionManager retries transport errors
        // internally but still propagates a failure if it cannot recover.
        let (_key, id_str): (String, String) = self
            .conn()
            .brpop(self.pending_key(), 0.0)
            .await
            .map_err(|e| queue_err("blocking pop", e))?;

        Uuid::parse_str(&id_str)
            .map_err(|e| EngineError::Queue(anyhow::anyhow!(e).context("parsing dequeued job id")))
    }

    async fn acquire_lock(&self, job_id: Uuid, ttl: Duration, holder: &str) -> Result<bool> {
        let acquired: Option<String> = redis::cmd("SET")
            .arg(self.lock_key(job_id))
            .arg(holder)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut self.conn())
            .await
            .map_err(|e| queue_err("acquiring lock", e))?;

        Ok(acquired.is_some())
    }

    async fn release_lock(&self, job_id: Uuid) -> Result<()> {
        self.conn()
            .del::<_, ()>(self.lock_key(job_id))
            .await
            .map_err(|e| queue_err("releasing lock", e))?;
        Ok(())
    }
}
