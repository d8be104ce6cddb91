use std::sync::Arc;

use envconfig::Envconfig;
use job_engine_api::config::Config;
use job_engine_api::{router, AppState};
use job_engine_postgres::PgJobStore;
use job_engine_queue_redis::RedisWorkQueue;

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

    let state = Arc::new(AppState { store, queue });
    let app = router(state);

    let bind = config.bind();
    tracing::info!(%bind, "job-engine-api starting");
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
