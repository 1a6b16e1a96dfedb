use anyhow::Context;

use schema_portal::cache::CredentialCache;
use schema_portal::config;
use schema_portal::routes;
use schema_portal::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up PORTAL_DATA_API_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = config::config();
    tracing::info!("Starting Schema Portal in {:?} mode", config.environment);
    if config.upstream.data_api_url.is_none() {
        tracing::warn!("PORTAL_DATA_API_URL is not set; data routes will answer with 500 envelopes");
    }

    // The cache and its sweeper are owned here; the sweeper task is aborted
    // when the guard drops at shutdown.
    let cache = CredentialCache::new();
    let _sweeper = cache.spawn_sweeper(std::time::Duration::from_secs(
        config.cache.sweep_interval_secs,
    ));

    let state = AppState::from_config(cache);
    let app = routes::app(state);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Schema Portal listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server")?;

    Ok(())
}
