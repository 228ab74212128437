use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;

pub mod schema;

pub use schema::ensure_schema;

/// Connect to the database named by DATABASE_URL and verify the connection
pub async fn connect(config: &AppConfig) -> Result<PgPool, sqlx::Error> {
    let url = std::env::var("DATABASE_URL")
        .map_err(|_| sqlx::Error::Configuration("DATABASE_URL is not set".into()))?;

    let pool = pool_options(config).connect(&url).await?;

    tracing::info!(
        max_connections = config.database.max_connections,
        "connected to PostgreSQL"
    );
    Ok(pool)
}

/// Build a pool without touching the server. Connections are established on
/// first use, which lets the HTTP surface come up before the database does.
pub fn lazy(url: &str, config: &AppConfig) -> Result<PgPool, sqlx::Error> {
    pool_options(config).connect_lazy(url)
}

fn pool_options(config: &AppConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
}
