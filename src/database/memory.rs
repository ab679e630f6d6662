//! In-process store implementing every persistence trait
//!
//! Backs the test suites and local runs without Postgres. Uniqueness rules
//! (idempotency key, attempt number per payment, webhook id per provider) are
//! enforced the same way the database constraints enforce them.

use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use crate::database::models::{AttemptStatus, Payment, PaymentAttempt, PaymentStatus, WebhookEvent};
use crate::database::repository::{
    AttemptCompletion, AttemptStore, Inserted, LedgerOutcome, NewAttempt, NewPayment,
    OutcomeUpdate, PaymentStore, WebhookLedger, WebhookRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    payments: HashMap<Uuid, Payment>,
    idempotency_index: HashMap<String, Uuid>,
    attempts: HashMap<Uuid, PaymentAttempt>,
    webhooks: HashMap<(String, String), WebhookEvent>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger rows, for assertions
    pub async fn webhook_count(&self) -> usize {
        self.state.lock().await.webhooks.len()
    }

    /// Stored payment rows, for assertions
    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.payments.len()
    }
}

fn payment_not_found(id: Uuid) -> DatabaseError {
    DatabaseError::not_found("Payment", id)
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_or_fetch(&self, payment: NewPayment) -> DbResult<Inserted> {
        let mut state = self.state.lock().await;

        if let Some(existing_id) = state.idempotency_index.get(&payment.idempotency_key) {
            let existing = state
                .payments
                .get(existing_id)
                .cloned()
                .ok_or_else(|| payment_not_found(*existing_id))?;
            return Ok(Inserted::Existing(existing));
        }

        let now = Utc::now();
        let row = Payment {
            id: Uuid::new_v4(),
            amount: payment.amount,
            currency: payment.currency,
            payment_method: payment.payment_method,
            customer_data: payment.customer_data,
            idempotency_key: payment.idempotency_key,
            description: payment.description,
            metadata: payment.metadata,
            status: PaymentStatus::Pending,
            provider_name: None,
            provider_transaction_id: None,
            webhook_history: serde_json::Value::Array(Vec::new()),
            last_attempt_at: None,
            created_at: now,
            updated_at: now,
        };

        state
            .idempotency_index
            .insert(row.idempotency_key.clone(), row.id);
        state.payments.insert(row.id, row.clone());
        Ok(Inserted::Created(row))
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Payment>> {
        Ok(self.state.lock().await.payments.get(&id).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> DbResult<Vec<Payment>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Payment> = state.payments.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> DbResult<i64> {
        Ok(self.state.lock().await.payments.len() as i64)
    }

    async fn update_status(&self, id: Uuid, status: PaymentStatus) -> DbResult<Payment> {
        let mut state = self.state.lock().await;
        let payment = state
            .payments
            .get_mut(&id)
            .ok_or_else(|| payment_not_found(id))?;

        payment.status = status;
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn record_outcome(&self, id: Uuid, update: OutcomeUpdate) -> DbResult<Payment> {
        let mut state = self.state.lock().await;
        let payment = state
            .payments
            .get_mut(&id)
            .ok_or_else(|| payment_not_found(id))?;

        payment.status = update.status;
        payment.provider_name = Some(update.provider_name);
        payment.provider_transaction_id = update.provider_transaction_id;
        payment.last_attempt_at = Some(update.attempted_at);
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn create(&self, attempt: NewAttempt) -> DbResult<PaymentAttempt> {
        let mut state = self.state.lock().await;

        if !state.payments.contains_key(&attempt.payment_id) {
            return Err(DatabaseError::new(DatabaseErrorKind::ForeignKeyViolation {
                constraint: "payment_attempts_payment_id_fkey".to_string(),
            }));
        }

        let duplicate = state.attempts.values().any(|existing| {
            existing.payment_id == attempt.payment_id
                && existing.attempt_number == attempt.attempt_number
        });
        if duplicate {
            return Err(DatabaseError::new(
                DatabaseErrorKind::UniqueConstraintViolation {
                    constraint: "payment_attempts_number_unique".to_string(),
                },
            ));
        }

        let now = Utc::now();
        let row = PaymentAttempt {
            id: Uuid::new_v4(),
            payment_id: attempt.payment_id,
            provider_name: attempt.provider_name,
            attempt_number: attempt.attempt_number,
            status: AttemptStatus::Processing,
            provider_transaction_id: None,
            request_data: attempt.request_data,
            response_data: None,
            message: None,
            created_at: now,
            updated_at: now,
        };

        state.attempts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn complete(&self, id: Uuid, completion: AttemptCompletion) -> DbResult<PaymentAttempt> {
        let mut state = self.state.lock().await;
        let attempt = state
            .attempts
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("PaymentAttempt", id))?;

        attempt.status = completion.status;
        attempt.provider_transaction_id = completion.provider_transaction_id;
        attempt.response_data = completion.response_data;
        attempt.message = completion.message;
        attempt.updated_at = Utc::now();
        Ok(attempt.clone())
    }

    async fn list_for_payment(&self, payment_id: Uuid) -> DbResult<Vec<PaymentAttempt>> {
        let state = self.state.lock().await;
        let mut rows: Vec<PaymentAttempt> = state
            .attempts
            .values()
            .filter(|attempt| attempt.payment_id == payment_id)
            .cloned()
            .collect();
        rows.sort_by_key(|attempt| attempt.attempt_number);
        Ok(rows)
    }
}

#[async_trait]
impl WebhookLedger for MemoryStore {
    async fn exists(&self, provider: &str, webhook_id: &str) -> DbResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .webhooks
            .contains_key(&(provider.to_string(), webhook_id.to_string())))
    }

    async fn record_and_apply(&self, record: WebhookRecord) -> DbResult<LedgerOutcome> {
        // Single lock acquisition stands in for the database transaction
        let mut state = self.state.lock().await;

        let key = (record.provider.clone(), record.webhook_id.clone());
        if state.webhooks.contains_key(&key) {
            return Ok(LedgerOutcome::Duplicate);
        }

        let now = Utc::now();
        state.webhooks.insert(
            key,
            WebhookEvent {
                id: Uuid::new_v4(),
                webhook_id: record.webhook_id,
                provider: record.provider.clone(),
                payload: record.payload.clone(),
                processed_at: now,
                created_at: now,
            },
        );

        let Some(transaction_id) = record.provider_transaction_id else {
            return Ok(LedgerOutcome::Unmatched);
        };

        let target = state.payments.values_mut().find(|payment| {
            payment.provider_name.as_deref() == Some(record.provider.as_str())
                && payment.provider_transaction_id.as_deref() == Some(transaction_id.as_str())
        });

        match target {
            Some(payment) => {
                if let Some(status) = record.status {
                    payment.status = status;
                }
                match payment.webhook_history.as_array_mut() {
                    Some(history) => history.push(record.payload),
                    None => payment.webhook_history = serde_json::Value::Array(vec![record.payload]),
                }
                payment.updated_at = now;
                Ok(LedgerOutcome::Applied {
                    payment_id: payment.id,
                })
            }
            None => Ok(LedgerOutcome::Unmatched),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn new_payment(key: &str) -> NewPayment {
        NewPayment {
            amount: Decimal::new(2500, 2),
            currency: "USD".to_string(),
            payment_method: "card".to_string(),
            customer_data: json!({"email": "buyer@example.com"}),
            idempotency_key: key.to_string(),
            description: None,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn test_insert_or_fetch_is_idempotent() {
        let store = MemoryStore::new();

        let first = match store.insert_or_fetch(new_payment("key-1")).await.unwrap() {
            Inserted::Created(payment) => payment,
            Inserted::Existing(_) => panic!("first insert must create"),
        };
        let second = match store.insert_or_fetch(new_payment("key-1")).await.unwrap() {
            Inserted::Existing(payment) => payment,
            Inserted::Created(_) => panic!("second insert must not create"),
        };

        assert_eq!(first.id, second.id);
        assert_eq!(first.status, PaymentStatus::Pending);
        assert_eq!(store.payment_count().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_attempt_number_rejected() {
        let store = MemoryStore::new();
        let payment = match store.insert_or_fetch(new_payment("key-2")).await.unwrap() {
            Inserted::Created(payment) | Inserted::Existing(payment) => payment,
        };

        let attempt = NewAttempt {
            payment_id: payment.id,
            provider_name: "stripe".to_string(),
            attempt_number: 1,
            request_data: json!({}),
        };
        store.create(attempt.clone()).await.unwrap();

        let err = store.create(attempt).await.unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_webhook_for_unknown_transaction_is_kept_unmatched() {
        let store = MemoryStore::new();
        let record = WebhookRecord {
            webhook_id: "evt_404".to_string(),
            provider: "stripe".to_string(),
            payload: json!({"id": "evt_404"}),
            provider_transaction_id: Some("pi_missing".to_string()),
            status: Some(PaymentStatus::Success),
        };

        assert_eq!(
            store.record_and_apply(record.clone()).await.unwrap(),
            LedgerOutcome::Unmatched
        );
        assert!(store.exists("stripe", "evt_404").await.unwrap());
        assert_eq!(
            store.record_and_apply(record).await.unwrap(),
            LedgerOutcome::Duplicate
        );
    }
}
