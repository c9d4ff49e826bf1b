use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{config::AppConfig, error::StoreError};

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_timeout())
        .connect(&config.database_url)
        .await
        .context("connect to database")?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("run migrations")?;
    Ok(())
}

/// Bounds a single storage call. A stalled store surfaces as
/// [`StoreError::Timeout`] and is not retried.
pub async fn timed<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(StoreError::from),
        Err(_) => {
            tracing::warn!(timeout_ms = limit.as_millis() as u64, "storage call timed out");
            Err(StoreError::Timeout)
        }
    }
}
