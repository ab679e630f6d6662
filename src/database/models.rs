//! Persisted payment entities and their status enums
//!
//! Status enums map onto the Postgres `payment_status` and `attempt_status` types
//! created by the migrations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single provider invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attempt_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Processing,
    Success,
    Pending,
    Failed,
    /// The provider call itself faulted
    Error,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Processing => "processing",
            AttemptStatus::Success => "success",
            AttemptStatus::Pending => "pending",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Error => "error",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment entity
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub customer_data: serde_json::Value,
    pub idempotency_key: String,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub status: PaymentStatus,
    pub provider_name: Option<String>,
    pub provider_transaction_id: Option<String>,
    /// Raw webhook payloads applied to this payment, oldest first
    pub webhook_history: serde_json::Value,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One provider invocation for a payment
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct PaymentAttempt {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub provider_name: String,
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub provider_transaction_id: Option<String>,
    pub request_data: serde_json::Value,
    pub response_data: Option<serde_json::Value>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Webhook dedup ledger entry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub webhook_id: String,
    pub provider: String,
    pub payload: serde_json::Value,
    pub processed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&PaymentStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");

        let parsed: AttemptStatus = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(parsed, AttemptStatus::Error);
    }

    #[test]
    fn test_status_display_matches_column_values() {
        assert_eq!(PaymentStatus::Processing.to_string(), "processing");
        assert_eq!(AttemptStatus::Pending.to_string(), "pending");
    }
}
