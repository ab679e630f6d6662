//! Payment provider types and data structures
//!
//! Common types exchanged between the orchestrator, the router and the providers.

use crate::database::models::{AttemptStatus, Payment, PaymentAttempt, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A validated payment submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Decimal,
    /// ISO 4217 code, upper case
    pub currency: String,
    pub payment_method: String,
    pub customer_data: serde_json::Value,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    /// Caller-supplied key; resubmitting with it returns the original payment
    pub idempotency_key: String,
}

/// Verdict a provider returns for a single charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Pending,
    Failed,
}

impl OutcomeStatus {
    pub fn payment_status(self) -> PaymentStatus {
        match self {
            OutcomeStatus::Success => PaymentStatus::Success,
            OutcomeStatus::Pending => PaymentStatus::Pending,
            OutcomeStatus::Failed => PaymentStatus::Failed,
        }
    }

    pub fn attempt_status(self) -> AttemptStatus {
        match self {
            OutcomeStatus::Success => AttemptStatus::Success,
            OutcomeStatus::Pending => AttemptStatus::Pending,
            OutcomeStatus::Failed => AttemptStatus::Failed,
        }
    }

    /// Success and pending both end the retry loop
    pub fn is_settled(self) -> bool {
        !matches!(self, OutcomeStatus::Failed)
    }
}

/// Provider response to [`PaymentRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub status: OutcomeStatus,
    pub provider_transaction_id: Option<String>,
    pub message: String,
    pub raw_response: serde_json::Value,
}

/// Provider-independent view of a webhook payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWebhook {
    /// `None` when the event carries no status change
    pub status: Option<PaymentStatus>,
    pub transaction_id: Option<String>,
    pub event_type: String,
}

/// What `submit` hands back to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub transaction_id: Uuid,
    pub status: PaymentStatus,
    pub provider_transaction_id: Option<String>,
    pub provider_name: Option<String>,
    pub message: String,
    pub raw_response: Option<serde_json::Value>,
    /// True when the idempotency key matched an existing payment
    #[serde(skip)]
    pub replayed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Applied,
    AlreadyProcessed,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResult {
    pub status: WebhookStatus,
    pub webhook_id: String,
    pub payment_id: Option<Uuid>,
}

/// A payment with its attempt chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetail {
    #[serde(flatten)]
    pub payment: Payment,
    pub attempts: Vec<PaymentAttempt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPage {
    pub items: Vec<Payment>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}
