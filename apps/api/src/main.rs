mod analysis;
mod auth;
mod broadcast;
mod config;
mod db;
mod errors;
mod extract;
mod llm_client;
mod models;
mod queue;
mod quota;
mod retry;
mod routes;
mod sessions;
mod state;
mod storage;
mod store;
mod worker;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::PipelineDeps;
use crate::broadcast::UpdateBroadcaster;
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::queue::RedisQueue;
use crate::quota::QuotaPolicy;
use crate::retry::{connect_with_retry, Backoff};
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{build_s3_client, S3ObjectStore};
use crate::store::PgStore;
use crate::worker::WorkerPool;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobMatch API v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL (migrations applied on connect)
    let db = create_pool(&config.database_url, config.database_max_connections).await?;
    let store = Arc::new(PgStore::new(db));

    // Redis job queue
    let queue = connect_with_retry("redis", Backoff::default(), || {
        RedisQueue::connect(&config.redis_url, &config.queue_name)
    })
    .await?;
    let queue = Arc::new(queue);

    // S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let broadcaster = Arc::new(UpdateBroadcaster::new());

    // Worker pool
    let deps = PipelineDeps {
        store: store.clone(),
        objects: Arc::new(S3ObjectStore::new(s3)),
        agent: Arc::new(llm),
        broadcaster: broadcaster.clone(),
        bucket: config.s3_bucket.clone(),
        fetch_timeout: config.fetch_timeout,
        agent_timeout: config.agent_timeout,
    };
    let workers = WorkerPool::start(
        config.worker_count,
        queue.clone(),
        deps,
        config.queue_ack_mode,
        CancellationToken::new(),
    )
    .await?;

    // Build app state
    let state = AppState {
        store: store.clone(),
        usage: store,
        queue,
        broadcaster,
        quota: QuotaPolicy {
            max_daily: config.quota_max_daily,
            window: config.quota_window,
            privileged_role: config.privileged_role.clone(),
        },
        sse_keep_alive: config.sse_keep_alive,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining workers");
    workers.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
