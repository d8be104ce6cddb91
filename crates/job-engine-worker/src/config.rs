use std::time::Duration;

use envconfig::Envconfig;
use uuid::Uuid;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub database_url: String,

    #[envconfig(from = "REDIS_URL")]
    pub redis_url: String,

    #[envconfig(from = "QUEUE_NAME", default = "jobs")]
    pub queue_name: String,

    #[envconfig(from = "LOCK_TTL_SECONDS", default = "90")]
    pub lock_ttl_seconds: u64,

    #[envconfig(from = "BACKOFF_CAP_SECONDS", default = "30")]
    pub backoff_cap_seconds: f64,

    #[envconfig(from = "WORKER_BATCH_SIZE", default = "10")]
    pub max_concurrent_jobs: usize,

    #[envconfig(from = "WORKER_ID")]
    pub worker_id: Option<String>,
}

impl Config {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_seconds)
    }

    pub fn worker_id(&self) -> String {
        self.worker_id
            .clone()
            .unwrap_or_else(|| format!("worker-{}", Uuid::new_v4()))
    }
}
