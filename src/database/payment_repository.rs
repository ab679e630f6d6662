use crate::database::error::{DatabaseError, DbResult};
use crate::database::models::{Payment, PaymentStatus};
use crate::database::repository::{Inserted, NewPayment, OutcomeUpdate, PaymentStore};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[cfg(feature = "cache")]
use crate::cache::{cache::Cache, keys::PaymentKey, ttl, RedisCache};
#[cfg(feature = "cache")]
use tracing::debug;

const PAYMENT_COLUMNS: &str = "id, amount, currency, payment_method, customer_data, idempotency_key, \
     description, metadata, status, provider_name, provider_transaction_id, webhook_history, \
     last_attempt_at, created_at, updated_at";

/// Postgres-backed payment store
pub struct PaymentRepository {
    pool: PgPool,
    #[cfg(feature = "cache")]
    cache: Option<RedisCache>,
}

impl PaymentRepository {
    /// Create a new repository without caching
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            #[cfg(feature = "cache")]
            cache: None,
        }
    }

    /// Create a new repository with Redis caching enabled
    #[cfg(feature = "cache")]
    pub fn with_cache(pool: PgPool, cache: RedisCache) -> Self {
        Self {
            pool,
            cache: Some(cache),
        }
    }

    async fn find_by_idempotency_key(&self, key: &str) -> DbResult<Option<Payment>> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE idempotency_key = $1",
            PAYMENT_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    #[cfg(feature = "cache")]
    async fn evict(&self, id: Uuid) {
        if let Some(ref cache) = self.cache {
            let key = PaymentKey::new(id).to_string();
            if let Err(e) = <RedisCache as Cache<Payment>>::delete(cache, &key).await {
                debug!("Failed to evict cached payment {}: {}", id, e);
            }
        }
    }

    #[cfg(not(feature = "cache"))]
    async fn evict(&self, _id: Uuid) {}
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn insert_or_fetch(&self, payment: NewPayment) -> DbResult<Inserted> {
        let inserted = sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments (id, amount, currency, payment_method, customer_data, idempotency_key, description, metadata, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending')
             ON CONFLICT (idempotency_key) DO NOTHING
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.payment_method)
        .bind(&payment.customer_data)
        .bind(&payment.idempotency_key)
        .bind(&payment.description)
        .bind(&payment.metadata)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if let Some(created) = inserted {
            return Ok(Inserted::Created(created));
        }

        // Lost the race (or a replay): the row behind the key is authoritative
        self.find_by_idempotency_key(&payment.idempotency_key)
            .await?
            .map(Inserted::Existing)
            .ok_or_else(|| {
                DatabaseError::not_found("Payment", &payment.idempotency_key)
                    .with_context("idempotency key conflict without a stored row")
            })
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Payment>> {
        #[cfg(feature = "cache")]
        let cache_key = PaymentKey::new(id).to_string();

        #[cfg(feature = "cache")]
        if let Some(ref cache) = self.cache {
            if let Ok(Some(cached)) = cache.get(&cache_key).await {
                debug!("Cache hit for payment: {}", id);
                return Ok(Some(cached));
            }
        }

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        #[cfg(feature = "cache")]
        if let (Some(ref cache), Some(ref found)) = (&self.cache, &payment) {
            if let Err(e) = cache.set(&cache_key, found, Some(ttl::PAYMENT)).await {
                debug!("Failed to cache payment {}: {}", id, e);
            }
        }

        Ok(payment)
    }

    async fn list(&self, limit: i64, offset: i64) -> DbResult<Vec<Payment>> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            PAYMENT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn count(&self) -> DbResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments")
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn update_status(&self, id: Uuid, status: PaymentStatus) -> DbResult<Payment> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("Payment", id))?;

        self.evict(id).await;
        Ok(payment)
    }

    async fn record_outcome(&self, id: Uuid, update: OutcomeUpdate) -> DbResult<Payment> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments
             SET status = $2, provider_name = $3, provider_transaction_id = $4,
                 last_attempt_at = $5, updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .bind(update.status)
        .bind(&update.provider_name)
        .bind(&update.provider_transaction_id)
        .bind(update.attempted_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("Payment", id))?;

        self.evict(id).await;
        Ok(payment)
    }

    async fn invalidate(&self, id: Uuid) {
        self.evict(id).await;
    }

    async fn ping(&self) -> DbResult<()> {
        super::health_check(&self.pool).await
    }
}
