use crate::database::error::{DatabaseError, DbResult};
use crate::database::models::{AttemptStatus, PaymentAttempt};
use crate::database::repository::{AttemptCompletion, AttemptStore, NewAttempt};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

const ATTEMPT_COLUMNS: &str = "id, payment_id, provider_name, attempt_number, status, \
     provider_transaction_id, request_data, response_data, message, created_at, updated_at";

/// Postgres-backed attempt history
pub struct AttemptRepository {
    pool: PgPool,
}

impl AttemptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for AttemptRepository {
    async fn create(&self, attempt: NewAttempt) -> DbResult<PaymentAttempt> {
        sqlx::query_as::<_, PaymentAttempt>(&format!(
            "INSERT INTO payment_attempts (id, payment_id, provider_name, attempt_number, status, request_data)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            ATTEMPT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(attempt.payment_id)
        .bind(&attempt.provider_name)
        .bind(attempt.attempt_number)
        .bind(AttemptStatus::Processing)
        .bind(&attempt.request_data)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn complete(&self, id: Uuid, completion: AttemptCompletion) -> DbResult<PaymentAttempt> {
        sqlx::query_as::<_, PaymentAttempt>(&format!(
            "UPDATE payment_attempts
             SET status = $2, provider_transaction_id = $3, response_data = $4, message = $5, updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .bind(completion.status)
        .bind(&completion.provider_transaction_id)
        .bind(&completion.response_data)
        .bind(&completion.message)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("PaymentAttempt", id))
    }

    async fn list_for_payment(&self, payment_id: Uuid) -> DbResult<Vec<PaymentAttempt>> {
        sqlx::query_as::<_, PaymentAttempt>(&format!(
            "SELECT {} FROM payment_attempts WHERE payment_id = $1 ORDER BY attempt_number ASC",
            ATTEMPT_COLUMNS
        ))
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
