use crate::database::error::{DatabaseError, DbResult};
use crate::database::repository::{LedgerOutcome, WebhookLedger, WebhookRecord};
use crate::database::transaction::DatabaseTransaction;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

/// Webhook ledger backed by the `webhook_events` table
pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookLedger for WebhookRepository {
    async fn exists(&self, provider: &str, webhook_id: &str) -> DbResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM webhook_events WHERE provider = $1 AND webhook_id = $2)",
        )
        .bind(provider)
        .bind(webhook_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn record_and_apply(&self, record: WebhookRecord) -> DbResult<LedgerOutcome> {
        let mut tx = DatabaseTransaction::begin(&self.pool).await?;

        let inserted = sqlx::query(
            "INSERT INTO webhook_events (id, webhook_id, provider, payload, processed_at)
             VALUES ($1, $2, $3, $4, NOW())
             ON CONFLICT (provider, webhook_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(&record.webhook_id)
        .bind(&record.provider)
        .bind(&record.payload)
        .execute(tx.conn()?)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .rows_affected();

        if inserted == 0 {
            debug!(
                provider = %record.provider,
                webhook_id = %record.webhook_id,
                "Concurrent delivery already recorded this webhook"
            );
            tx.rollback().await?;
            return Ok(LedgerOutcome::Duplicate);
        }

        let Some(transaction_id) = record.provider_transaction_id.as_deref() else {
            tx.commit().await?;
            return Ok(LedgerOutcome::Unmatched);
        };

        // Locks the payment row for the rest of the transaction
        let payment_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM payments
             WHERE provider_name = $1 AND provider_transaction_id = $2
             ORDER BY created_at DESC LIMIT 1
             FOR UPDATE",
        )
        .bind(&record.provider)
        .bind(transaction_id)
        .fetch_optional(tx.conn()?)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some(payment_id) = payment_id else {
            tx.commit().await?;
            return Ok(LedgerOutcome::Unmatched);
        };

        sqlx::query(
            "UPDATE payments
             SET status = COALESCE($2, status),
                 webhook_history = webhook_history || jsonb_build_array($3::jsonb),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(payment_id)
        .bind(record.status)
        .bind(&record.payload)
        .execute(tx.conn()?)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await?;
        Ok(LedgerOutcome::Applied { payment_id })
    }
}
