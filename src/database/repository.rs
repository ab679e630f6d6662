use crate::database::error::DbResult;
use crate::database::models::{AttemptStatus, Payment, PaymentAttempt, PaymentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Attributes of a payment about to be created
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub customer_data: serde_json::Value,
    pub idempotency_key: String,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
}

/// Result of an idempotent insert
#[derive(Debug, Clone)]
pub enum Inserted {
    /// A new row was written
    Created(Payment),
    /// The idempotency key was already taken; this is the stored row
    Existing(Payment),
}

/// Fields written after a provider answered
#[derive(Debug, Clone)]
pub struct OutcomeUpdate {
    pub status: PaymentStatus,
    pub provider_name: String,
    pub provider_transaction_id: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub payment_id: Uuid,
    pub provider_name: String,
    pub attempt_number: i32,
    pub request_data: serde_json::Value,
}

/// Terminal data recorded on an attempt
#[derive(Debug, Clone)]
pub struct AttemptCompletion {
    pub status: AttemptStatus,
    pub provider_transaction_id: Option<String>,
    pub response_data: Option<serde_json::Value>,
    pub message: Option<String>,
}

/// A verified, normalized webhook ready to be written to the ledger
#[derive(Debug, Clone)]
pub struct WebhookRecord {
    pub webhook_id: String,
    pub provider: String,
    pub payload: serde_json::Value,
    pub provider_transaction_id: Option<String>,
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// Another delivery of the same webhook won the insert
    Duplicate,
    /// Ledger row written but no payment carries the transaction id
    Unmatched,
    Applied { payment_id: Uuid },
}

/// Payment persistence
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a payment unless its idempotency key exists, returning the stored row either way
    async fn insert_or_fetch(&self, payment: NewPayment) -> DbResult<Inserted>;

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Payment>>;

    /// Page of payments, newest first
    async fn list(&self, limit: i64, offset: i64) -> DbResult<Vec<Payment>>;

    async fn count(&self) -> DbResult<i64>;

    async fn update_status(&self, id: Uuid, status: PaymentStatus) -> DbResult<Payment>;

    async fn record_outcome(&self, id: Uuid, update: OutcomeUpdate) -> DbResult<Payment>;

    /// Drop any cached copy of a payment changed outside this store
    async fn invalidate(&self, _id: Uuid) {}

    /// Connectivity probe for health checks
    async fn ping(&self) -> DbResult<()>;
}

/// Attempt history persistence
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn create(&self, attempt: NewAttempt) -> DbResult<PaymentAttempt>;

    async fn complete(&self, id: Uuid, completion: AttemptCompletion) -> DbResult<PaymentAttempt>;

    /// Attempts for a payment ordered by attempt number
    async fn list_for_payment(&self, payment_id: Uuid) -> DbResult<Vec<PaymentAttempt>>;
}

/// Webhook dedup ledger
#[async_trait]
pub trait WebhookLedger: Send + Sync {
    async fn exists(&self, provider: &str, webhook_id: &str) -> DbResult<bool>;

    /// Atomically record the webhook and apply it to the matching payment
    async fn record_and_apply(&self, record: WebhookRecord) -> DbResult<LedgerOutcome>;
}
