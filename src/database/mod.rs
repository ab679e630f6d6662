pub mod attempt_repository;
pub mod error;
pub mod memory;
pub mod models;
pub mod payment_repository;
pub mod repository;
pub mod transaction;
pub mod webhook_repository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error as log_error, info, warn};

use self::attempt_repository::AttemptRepository;
use self::error::DatabaseError;
use self::memory::MemoryStore;
use self::payment_repository::PaymentRepository;
use self::repository::{AttemptStore, PaymentStore, WebhookLedger};
use self::webhook_repository::WebhookRepository;

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 2,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// Initialize the database connection pool
pub async fn init_pool(
    database_url: &str,
    config: Option<PoolConfig>,
) -> Result<PgPool, DatabaseError> {
    let config = config.unwrap_or_default();

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connection_timeout = ?config.connection_timeout,
        "Initializing database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(database_url)
        .await
        .map_err(|e| {
            log_error!("Failed to initialize database pool: {}", e);
            DatabaseError::from_sqlx(e)
        })?;

    info!("Database pool initialized successfully");
    Ok(pool)
}

/// Apply pending migrations from `./migrations`
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        log_error!("Failed to run migrations: {}", e);
        DatabaseError::from(e)
    })?;

    info!("Database migrations applied");
    Ok(())
}

/// Connection pool health check
pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| {
            warn!("Health check failed: {}", e);
            DatabaseError::from_sqlx(e)
        })?;

    Ok(())
}

/// The three persistence seams the orchestrator depends on
#[derive(Clone)]
pub struct Stores {
    pub payments: Arc<dyn PaymentStore>,
    pub attempts: Arc<dyn AttemptStore>,
    pub webhooks: Arc<dyn WebhookLedger>,
}

impl Stores {
    /// Postgres repositories sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self::from_payment_repository(PaymentRepository::new(pool.clone()), pool)
    }

    /// Postgres repositories with a read-through cache on payment lookups
    #[cfg(feature = "cache")]
    pub fn postgres_with_cache(pool: PgPool, cache: crate::cache::RedisCache) -> Self {
        Self::from_payment_repository(PaymentRepository::with_cache(pool.clone(), cache), pool)
    }

    fn from_payment_repository(payments: PaymentRepository, pool: PgPool) -> Self {
        Self {
            payments: Arc::new(payments),
            attempts: Arc::new(AttemptRepository::new(pool.clone())),
            webhooks: Arc::new(WebhookRepository::new(pool)),
        }
    }

    /// Everything held in process memory
    pub fn memory(store: MemoryStore) -> Self {
        Self {
            payments: Arc::new(store.clone()),
            attempts: Arc::new(store.clone()),
            webhooks: Arc::new(store),
        }
    }
}
