use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::retry::{connect_with_retry, Backoff};

/// Creates a PostgreSQL connection pool and applies pending migrations.
/// The first connection is retried with backoff while the server comes up.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = connect_with_retry("postgres", Backoff::default(), || {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
    })
    .await?;

    info!("PostgreSQL connection pool established");

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}
