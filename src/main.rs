use anyhow::Context;
use payflow_backend::config::{Config, ProvidersConfig};
use payflow_backend::database::{self, PoolConfig, Stores};
use payflow_backend::payments::providers::build_providers;
use payflow_backend::payments::{PaymentOrchestrator, ProviderRouter, RetryPolicy, RoutingPolicy};
use payflow_backend::{app, telemetry, AppState};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting PayFlow backend");
    tracing::info!("Environment: {}", config.server.environment);

    let pool_config = PoolConfig {
        max_connections: config.database.max_connections,
        min_connections: config.database.max_connections.min(2),
        ..PoolConfig::default()
    };
    let pool = database::init_pool(&config.database.url, Some(pool_config))
        .await
        .context("Failed to connect to the database")?;
    database::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let stores = build_stores(&config, pool).await;

    let providers = ProvidersConfig::load()?;
    let router = ProviderRouter::new(
        build_providers(&providers),
        RoutingPolicy::from(&config.routing),
    );
    tracing::info!(providers = ?router.provider_names(), "Payment providers registered");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let orchestrator = PaymentOrchestrator::new(
        Arc::new(router),
        stores,
        RetryPolicy::from(&config.orchestrator),
        shutdown_rx,
    );

    let state = AppState::new(Arc::new(orchestrator), config.server.environment.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown requested, cancelling pending retries");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}

#[cfg(feature = "cache")]
async fn build_stores(config: &Config, pool: sqlx::PgPool) -> Stores {
    use payflow_backend::cache::{init_cache_pool, CacheConfig, RedisCache};

    let Some(redis) = &config.redis else {
        return Stores::postgres(pool);
    };

    match init_cache_pool(CacheConfig::with_url(redis.url.clone())).await {
        Ok(cache_pool) => {
            tracing::info!("Payment cache enabled");
            Stores::postgres_with_cache(pool, RedisCache::new(cache_pool))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, continuing without cache");
            Stores::postgres(pool)
        }
    }
}

#[cfg(not(feature = "cache"))]
async fn build_stores(_config: &Config, pool: sqlx::PgPool) -> Stores {
    Stores::postgres(pool)
}
