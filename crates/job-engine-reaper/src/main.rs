mod config;

use std::sync::Arc;

use config::Config;
use envconfig::Envconfig;
use job_engine_core::{Reaper, ReaperConfig};
use job_engine_postgres::PgJobStore;
use job_engine_queue_redis::RedisWorkQueue;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("invalid configuration");

    let store = Arc::new(
        PgJobStore::connect(&config.database_url)
            .await
            .expect("failed to connect to job store"),
    );
    let queue = Arc::new(
        RedisWorkQueue::connect(&config.redis_url, config.queue_name.clone())
            .await
            .expect("failed to connect to work queue"),
    );

    let reaper = Reaper::with_config(
        store,
        queue,
        ReaperConfig {
            running_timeout: config.running_timeout(),
            scan_interval: config.scan_interval(),
        },
    );

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    reaper.run(shutdown).await;

    Ok(())
}
