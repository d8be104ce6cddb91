use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub database_url: String,

    #[envconfig(from = "REDIS_URL")]
    pub redis_url: String,

    #[envconfig(from = "QUEUE_NAME", default = "jobs")]
    pub queue_name: String,

    #[envconfig(from = "RUNNING_TIMEOUT_SECONDS", default = "120")]
    pub running_timeout_seconds: u64,

    #[envconfig(from = "REAPER_SCAN_INTERVAL_SECONDS", default = "5")]
    pub scan_interval_seconds: u64,
}

impl Config {
    pub fn running_timeout(&self) -> Duration {
        Duration::from_secs(self.running_timeout_seconds)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds)
    }
}
