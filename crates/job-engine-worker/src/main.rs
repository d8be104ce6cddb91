mod config;

use std::sync::Arc;

use config::Config;
use envconfig::Envconfig;
use job_engine_core::{HandlerRegistry, Worker, WorkerConfig};
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

    let mut registry = HandlerRegistry::new();
    job_engine_handlers::register_all(&mut registry);
    let registry = Arc::new(registry);

    let worker = Arc::new(Worker::with_config(
        store,
        queue,
        registry,
        WorkerConfig {
            worker_id: config.worker_id(),
            lock_ttl: config.lock_ttl(),
            backoff_cap_seconds: config.backoff_cap_seconds,
            max_concurrent_jobs: config.max_concurrent_jobs,
        },
    ));

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received; draining in-flight jobs");
        shutdown_signal.cancel();
    });

    worker.run(shutdown).await;

    Ok(())
}
