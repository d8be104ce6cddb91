//! The worker main loop: pop, lock, load, execute, finalise, unlock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backoff::compute_delay_seconds;
use crate::queue::WorkQueue;
use crate::registry::HandlerRegistry;
use crate::store::{FailureOutcome, JobStore};

/// Tunables for one worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identity recorded as the lock holder; also used in log lines.
    pub worker_id: String,
    /// TTL granted to the advisory lock while a job is in flight.
    pub lock_ttl: Duration,
    /// Cap applied to the full-jitter backoff delay, in seconds.
    pub backoff_cap_seconds: f64,
    /// Maximum number of jobs this worker processes concurrently.
    pub max_concurrent_jobs: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", Uuid::new_v4()),
            lock_ttl: Duration::from_secs(90),
            backoff_cap_seconds: 30.0,
            max_concurrent_jobs: 10,
        }
    }
}

/// Drives jobs through the state machine against a [`JobStore`] and
/// [`WorkQueue`] pair, dispatching to a fixed [`HandlerRegistry`].
pub struct Worker<S: JobStore, Q: WorkQueue> {
    store: Arc<S>,
    queue: Arc<Q>,
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
    in_flight: Arc<AtomicUsize>,
}

impl<S: JobStore + 'static, Q: WorkQueue + 'static> Worker<S, Q> {
    pub fn new(store: Arc<S>, queue: Arc<Q>, registry: Arc<HandlerRegistry>) -> Self {
        Self::with_config(store, queue, registry, WorkerConfig::default())
    }

    pub fn with_config(
        store: Arc<S>,
        queue: Arc<Q>,
        registry: Arc<HandlerRegistry>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            queue,
            registry,
            config,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run until `shutdown` is cancelled, then drain in-flight jobs before
    /// returning.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(worker_id = %self.config.worker_id, "worker starting");

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_jobs));

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let job_id = tokio::select! {
                _ = shutdown.cancelled() => break,
                popped = self.queue.dequeue_blocking() => match popped {
                    Ok(id) => id,
                    Err(e) => {
                        error!(error = %e, "failed to dequeue; retrying shortly");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                },
            };

            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break, // semaphore closed, shutting down
            };

            let worker = self.clone();
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                worker.process_one(job_id).await;
                worker.in_flight.fetch_sub(1, Ordering::SeqCst);
                drop(permit);
            });
        }

        while self.in_flight.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!(worker_id = %self.config.worker_id, "worker stopped");
    }

    /// Steps 2-8 of the worker loop for a single popped id.
    async fn process_one(&self, job_id: Uuid) {
        let acquired = match self
            .queue
            .acquire_lock(job_id, self.config.lock_ttl, &self.config.worker_id)
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to acquire lock");
                return;
            }
        };

        if !acquired {
            debug!(job_id = %job_id, "lock held elsewhere; skipping");
            return;
        }

        self.drive_locked_job(job_id).await;

        if let Err(e) = self.queue.release_lock(job_id).await {
            warn!(job_id = %job_id, error = %e, "failed to release lock");
        }
    }

    async fn drive_locked_job(&self, job_id: Uuid) {
        let job = match self.store.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!(job_id = %job_id, "job not found; skipping");
                return;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to load job");
                return;
            }
        };

        if !job.state.is_runnable() {
            debug!(job_id = %job_id, state = %job.state, "job already in flight or terminal; skipping");
            return;
        }

        let Some(handler) = self.registry.get(&job.job_type) else {
            warn!(job_id = %job_id, job_type = %job.job_type, "unsupported job type");
            if let Err(e) = self
                .store
                .mark_unsupported_type(job_id, &job.job_type)
                .await
            {
                error!(job_id = %job_id, error = %e, "failed to record unsupported job type");
            }
            return;
        };

        let retry_delay_base = job.retry_delay_seconds;

        let running = match self.store.mark_running(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!(job_id = %job_id, "job vanished before marking running");
                return;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to mark job running");
                return;
            }
        };

        debug!(job_id = %job_id, job_type = %running.job_type, attempt = running.attempt, "executing handler");
        let outcome = handler.execute(&running.payload).await;

        match outcome {
            Ok(result) => {
                info!(job_id = %job_id, job_type = %running.job_type, attempt = running.attempt, "job succeeded");
                if let Err(e) = self
                    .store
                    .mark_succeeded(job_id, result.unwrap_or(serde_json::Value::Null))
                    .await
                {
                    error!(job_id = %job_id, error = %e, "failed to mark job succeeded");
                }
            }
            Err(message) => {
                self.finalise_failure(job_id, &running.job_type, &message, retry_delay_base)
                    .await
            }
        }
    }

    async fn finalise_failure(
        &self,
        job_id: Uuid,
        job_type: &str,
        message: &str,
        retry_delay_base: f64,
    ) {
        let outcome = match self.store.mark_failed(job_id, message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to record job failure");
                return;
            }
        };

        match outcome {
            FailureOutcome::Retrying { attempt } => {
                let delay = compute_delay_seconds(
                    retry_delay_base,
                    attempt as u32,
                    self.config.backoff_cap_seconds,
                );
                warn!(
                    job_id = %job_id, job_type = %job_type, attempt, error = %message,
                    delay_seconds = delay, "job failed; retrying after backoff"
                );
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                if let Err(e) = self.queue.enqueue(job_id).await {
                    error!(job_id = %job_id, error = %e, "failed to re-enqueue job for retry");
                }
            }
            FailureOutcome::Failed => {
                warn!(job_id = %job_id, job_type = %job_type, error = %message, "job failed; retries exhausted");
            }
        }
    }
}
