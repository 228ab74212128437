use anyhow::Context;
use tracing_subscriber::EnvFilter;

use soko_api::config::{config, INSECURE_JWT_SECRET};
use soko_api::{db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL and SOKO_* overrides
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("soko_api=debug,tower_http=info")),
        )
        .init();

    let config = config();
    tracing::info!("starting Soko API in {:?} mode", config.environment);
    if soko_api::is_production!() && config.security.jwt_secret == INSECURE_JWT_SECRET {
        tracing::warn!("SOKO_JWT_SECRET is unset; tokens are signed with the built-in secret");
    }

    let pool = db::connect(config).await.context("connecting to PostgreSQL")?;
    db::ensure_schema(&pool).await.context("ensuring database schema")?;

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("Soko API listening on http://{}", bind_addr);

    soko_api::serve(listener, AppState::new(pool)).await.context("server")?;
    Ok(())
}
