//! The reaper: periodically reclaims jobs abandoned in RUNNING past a
//! timeout, without ever acquiring the per-job lock (see SPEC_FULL.md's
//! open-question resolution).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::job::Job;
use crate::queue::WorkQueue;
use crate::store::JobStore;

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// How long a job may stay RUNNING before being considered abandoned.
    pub running_timeout: Duration,
    /// How often to scan for stuck jobs.
    pub scan_interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            running_timeout: Duration::from_secs(120),
            scan_interval: Duration::from_secs(5),
        }
    }
}

pub struct Reaper<S: JobStore, Q: WorkQueue> {
    store: Arc<S>,
    queue: Arc<Q>,
    config: ReaperConfig,
}

impl<S: JobStore, Q: WorkQueue> Reaper<S, Q> {
    pub fn new(store: Arc<S>, queue: Arc<Q>) -> Self {
        Self::with_config(store, queue, ReaperConfig::default())
    }

    pub fn with_config(store: Arc<S>, queue: Arc<Q>, config: ReaperConfig) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            running_timeout_secs = self.config.running_timeout.as_secs(),
            scan_interval_secs = self.config.scan_interval.as_secs(),
            "reaper starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.scan_interval) => {}
            }

            if let Err(e) = self.scan_once().await {
                error!(error = %e, "reaper scan failed; retrying next interval");
            }
        }

        info!("reaper stopped");
    }

    /// A single scan-and-reclaim pass. Exposed directly so tests and a
    /// `run-once` CLI mode don't have to wait out a full sleep interval.
    pub async fn scan_once(&self) -> anyhow::Result<()> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.running_timeout)
                .unwrap_or_else(|_| chrono::Duration::seconds(0));

        let stuck = self
            .store
            .query_stuck(cutoff)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;

        for job in stuck {
            self.reclaim(&job).await;
        }

        Ok(())
    }

    async fn reclaim(&self, job: &Job) {
        if job.has_retries_remaining() {
            if let Err(e) = self.store.mark_reaped_retrying(job.id).await {
                error!(job_id = %job.id, error = %e, "failed to mark reaped job retrying");
                return;
            }
            if let Err(e) = self.queue.enqueue(job.id).await {
                error!(job_id = %job.id, error = %e, "failed to re-enqueue reaped job");
                return;
            }
            warn!(job_id = %job.id, attempt = job.attempt, "reclaimed stuck job; requeued");
        } else {
            if let Err(e) = self.store.mark_reaped_failed(job.id).await {
                error!(job_id = %job.id, error = %e, "failed to mark reaped job failed");
                return;
            }
            warn!(job_id = %job.id, attempt = job.attempt, "reclaimed stuck job; no retries left");
        }
    }
}
