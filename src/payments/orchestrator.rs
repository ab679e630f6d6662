//! Payment orchestration
//!
//! Owns the payment state machine: idempotent creation, the bounded retry loop
//! across providers and idempotent webhook application.
//!
//! ```text
//! pending -> processing -> success | pending | failed
//!                 ^                              |
//!                 +------ retry (with backoff) --+
//! ```

use crate::database::models::{AttemptStatus, Payment, PaymentStatus};
use crate::database::repository::{
    AttemptCompletion, Inserted, LedgerOutcome, NewAttempt, NewPayment, OutcomeUpdate,
    WebhookRecord,
};
use crate::database::Stores;
use crate::error::{AppError, AppResult, DomainError};
use crate::payments::retry::RetryPolicy;
use crate::payments::router::ProviderRouter;
use crate::payments::signature;
use crate::payments::types::{
    PaymentDetail, PaymentPage, PaymentRequest, PaymentResult, WebhookResult, WebhookStatus,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Provider name reported when no provider produced the final verdict
pub const SYSTEM_PROVIDER: &str = "system";

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Dedup id for a webhook: its `id` field, else the SHA-256 of the canonical JSON
pub fn webhook_id(payload: &Value) -> String {
    match payload.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => signature::sha256_hex(canonicalize(payload).to_string().as_bytes()),
    }
}

/// Rebuild `value` with every object's keys inserted in sorted order.
///
/// Serialization then yields the same bytes whether or not serde_json's
/// `preserve_order` feature is enabled somewhere in the build.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|key| (key.clone(), canonicalize(&map[key])))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

pub struct PaymentOrchestrator {
    router: Arc<ProviderRouter>,
    stores: Stores,
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl PaymentOrchestrator {
    pub fn new(
        router: Arc<ProviderRouter>,
        stores: Stores,
        retry: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            router,
            stores,
            retry,
            shutdown,
        }
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    /// Create (or replay) a payment and drive it to a settled status
    pub async fn submit(
        &self,
        request: PaymentRequest,
        preferred: Option<&str>,
    ) -> AppResult<PaymentResult> {
        if let Some(name) = preferred {
            if !self.router.is_registered(name) {
                return Err(AppError::domain(DomainError::UnknownProvider {
                    name: name.to_string(),
                }));
            }
        }

        let inserted = self
            .stores
            .payments
            .insert_or_fetch(NewPayment {
                amount: request.amount,
                currency: request.currency.clone(),
                payment_method: request.payment_method.clone(),
                customer_data: request.customer_data.clone(),
                idempotency_key: request.idempotency_key.clone(),
                description: request.description.clone(),
                metadata: request.metadata.clone(),
            })
            .await?;

        let payment = match inserted {
            Inserted::Existing(existing) => {
                info!(
                    payment_id = %existing.id,
                    idempotency_key = %existing.idempotency_key,
                    status = %existing.status,
                    "Returning existing payment for idempotency key"
                );
                return Ok(Self::replayed(existing));
            }
            Inserted::Created(created) => created,
        };

        info!(
            payment_id = %payment.id,
            amount = %payment.amount,
            currency = %payment.currency,
            preferred_provider = preferred.unwrap_or("-"),
            "Payment created"
        );

        match self.run_attempts(&payment, &request, preferred).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(payment_id = %payment.id, error = %e, "Payment processing aborted");
                // Never leave the row in `processing`
                if let Err(settle_err) = self
                    .stores
                    .payments
                    .update_status(payment.id, PaymentStatus::Failed)
                    .await
                {
                    error!(
                        payment_id = %payment.id,
                        error = %settle_err,
                        "Failed to settle aborted payment"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_attempts(
        &self,
        payment: &Payment,
        request: &PaymentRequest,
        preferred: Option<&str>,
    ) -> AppResult<PaymentResult> {
        let mut shutdown = self.shutdown.clone();
        let request_data = serde_json::to_value(request)
            .map_err(|e| AppError::validation(format!("Unserializable payment request: {}", e)))?;
        let mut last_message = String::new();

        for attempt in 1..=self.retry.max_attempts {
            // Preference only steers the first attempt; retries re-route from scratch
            let preference = if attempt == 1 { preferred } else { None };
            let provider = self
                .router
                .route(&request.amount, &request.currency, preference)?;
            let provider_name = provider.name().to_string();

            self.stores
                .payments
                .update_status(payment.id, PaymentStatus::Processing)
                .await?;

            let attempt_row = self
                .stores
                .attempts
                .create(NewAttempt {
                    payment_id: payment.id,
                    provider_name: provider_name.clone(),
                    attempt_number: attempt as i32,
                    request_data: request_data.clone(),
                })
                .await?;

            info!(
                payment_id = %payment.id,
                provider = %provider_name,
                attempt,
                "Dispatching payment to provider"
            );

            match provider.execute(request).await {
                Ok(outcome) => {
                    self.stores
                        .attempts
                        .complete(
                            attempt_row.id,
                            AttemptCompletion {
                                status: outcome.status.attempt_status(),
                                provider_transaction_id: outcome.provider_transaction_id.clone(),
                                response_data: Some(outcome.raw_response.clone()),
                                message: Some(outcome.message.clone()),
                            },
                        )
                        .await?;

                    let updated = self
                        .stores
                        .payments
                        .record_outcome(
                            payment.id,
                            OutcomeUpdate {
                                status: outcome.status.payment_status(),
                                provider_name: provider_name.clone(),
                                provider_transaction_id: outcome.provider_transaction_id.clone(),
                                attempted_at: Utc::now(),
                            },
                        )
                        .await?;

                    if outcome.status.is_settled() {
                        info!(
                            payment_id = %payment.id,
                            provider = %provider_name,
                            attempt,
                            status = %updated.status,
                            "Payment settled"
                        );
                        return Ok(PaymentResult {
                            transaction_id: payment.id,
                            status: updated.status,
                            provider_transaction_id: outcome.provider_transaction_id,
                            provider_name: Some(provider_name),
                            message: outcome.message,
                            raw_response: Some(outcome.raw_response),
                            replayed: false,
                        });
                    }

                    warn!(
                        payment_id = %payment.id,
                        provider = %provider_name,
                        attempt,
                        reason = %outcome.message,
                        "Provider declined payment"
                    );
                    last_message = outcome.message;
                }
                Err(e) => {
                    warn!(
                        payment_id = %payment.id,
                        provider = %provider_name,
                        attempt,
                        error = %e,
                        "Provider call failed"
                    );
                    let message = e.to_string();

                    self.stores
                        .attempts
                        .complete(
                            attempt_row.id,
                            AttemptCompletion {
                                status: AttemptStatus::Error,
                                provider_transaction_id: None,
                                response_data: None,
                                message: Some(message.clone()),
                            },
                        )
                        .await?;

                    self.stores
                        .payments
                        .record_outcome(
                            payment.id,
                            OutcomeUpdate {
                                status: PaymentStatus::Failed,
                                provider_name: provider_name.clone(),
                                provider_transaction_id: None,
                                attempted_at: Utc::now(),
                            },
                        )
                        .await?;

                    if !e.is_retryable() {
                        warn!(
                            payment_id = %payment.id,
                            provider = %provider_name,
                            attempt,
                            "Provider error is not retryable, settling payment"
                        );
                        return self
                            .settle_failed(
                                payment.id,
                                format!("Payment processing failed: {}", message),
                            )
                            .await;
                    }

                    last_message = message;
                }
            }

            if self.retry.has_attempts_left(attempt) {
                let delay = self.retry.delay_for(attempt);
                warn!(
                    payment_id = %payment.id,
                    attempt,
                    max_attempts = self.retry.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying payment"
                );

                if !self.retry.wait(attempt, &mut shutdown).await {
                    warn!(payment_id = %payment.id, attempt, "Retry cancelled by shutdown");
                    return self
                        .settle_failed(
                            payment.id,
                            format!("Payment processing cancelled during shutdown: {}", last_message),
                        )
                        .await;
                }
            }
        }

        warn!(
            payment_id = %payment.id,
            max_attempts = self.retry.max_attempts,
            "Payment failed after all retries"
        );
        self.settle_failed(
            payment.id,
            format!("Payment processing failed after all retries: {}", last_message),
        )
        .await
    }

    async fn settle_failed(&self, payment_id: Uuid, message: String) -> AppResult<PaymentResult> {
        let settled = self
            .stores
            .payments
            .update_status(payment_id, PaymentStatus::Failed)
            .await?;

        Ok(PaymentResult {
            transaction_id: payment_id,
            status: settled.status,
            provider_transaction_id: settled.provider_transaction_id,
            provider_name: Some(SYSTEM_PROVIDER.to_string()),
            message,
            raw_response: None,
            replayed: false,
        })
    }

    fn replayed(payment: Payment) -> PaymentResult {
        PaymentResult {
            transaction_id: payment.id,
            status: payment.status,
            provider_transaction_id: payment.provider_transaction_id,
            provider_name: payment.provider_name,
            message: "Existing payment returned (idempotent)".to_string(),
            raw_response: None,
            replayed: true,
        }
    }

    /// Deduplicate, verify and apply one provider webhook delivery
    pub async fn apply_webhook(
        &self,
        provider_name: &str,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> AppResult<WebhookResult> {
        let payload: Value = serde_json::from_slice(raw_body).map_err(|e| {
            AppError::domain(DomainError::InvalidWebhookPayload {
                reason: e.to_string(),
            })
        })?;
        if !payload.is_object() {
            return Err(AppError::domain(DomainError::InvalidWebhookPayload {
                reason: "payload must be a JSON object".to_string(),
            }));
        }

        let webhook_id = webhook_id(&payload);

        if self.stores.webhooks.exists(provider_name, &webhook_id).await? {
            info!(provider = %provider_name, webhook_id = %webhook_id, "Webhook already processed");
            return Ok(WebhookResult {
                status: WebhookStatus::AlreadyProcessed,
                webhook_id,
                payment_id: None,
            });
        }

        let provider = self.router.by_name(provider_name).ok_or_else(|| {
            AppError::domain(DomainError::UnknownProvider {
                name: provider_name.to_string(),
            })
        })?;

        if !provider.verify_webhook_signature(raw_body, signature) {
            warn!(provider = %provider_name, webhook_id = %webhook_id, "Webhook signature rejected");
            return Err(AppError::domain(DomainError::InvalidWebhookSignature {
                provider: provider_name.to_string(),
            }));
        }

        let normalized = provider.normalize_webhook(&payload);

        let outcome = self
            .stores
            .webhooks
            .record_and_apply(WebhookRecord {
                webhook_id: webhook_id.clone(),
                provider: provider_name.to_string(),
                payload,
                provider_transaction_id: normalized.transaction_id.clone(),
                status: normalized.status,
            })
            .await?;

        let result = match outcome {
            LedgerOutcome::Duplicate => WebhookResult {
                status: WebhookStatus::AlreadyProcessed,
                webhook_id,
                payment_id: None,
            },
            LedgerOutcome::Unmatched => {
                warn!(
                    provider = %provider_name,
                    webhook_id = %webhook_id,
                    event_type = %normalized.event_type,
                    transaction_id = normalized.transaction_id.as_deref().unwrap_or("-"),
                    "Webhook does not match any payment"
                );
                WebhookResult {
                    status: WebhookStatus::NotFound,
                    webhook_id,
                    payment_id: None,
                }
            }
            LedgerOutcome::Applied { payment_id } => {
                self.stores.payments.invalidate(payment_id).await;
                info!(
                    provider = %provider_name,
                    webhook_id = %webhook_id,
                    payment_id = %payment_id,
                    event_type = %normalized.event_type,
                    status = normalized.status.map(|s| s.as_str()).unwrap_or("unchanged"),
                    "Webhook applied"
                );
                WebhookResult {
                    status: WebhookStatus::Applied,
                    webhook_id,
                    payment_id: Some(payment_id),
                }
            }
        };

        Ok(result)
    }

    /// Payment with its attempts in order
    pub async fn get_payment(&self, id: Uuid) -> AppResult<PaymentDetail> {
        let payment = self
            .stores
            .payments
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::domain(DomainError::PaymentNotFound { id }))?;

        let attempts = self.stores.attempts.list_for_payment(id).await?;

        Ok(PaymentDetail { payment, attempts })
    }

    /// Newest-first page; `page` is 1-based
    pub async fn list_payments(&self, page: u32, per_page: u32) -> AppResult<PaymentPage> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        let offset = i64::from(page - 1) * i64::from(per_page);

        let items = self
            .stores
            .payments
            .list(i64::from(per_page), offset)
            .await?;
        let total = self.stores.payments.count().await?;

        Ok(PaymentPage {
            items,
            page,
            per_page,
            total,
        })
    }

    /// Store connectivity
    pub async fn ping(&self) -> AppResult<()> {
        self.stores.payments.ping().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_webhook_id_prefers_id_field() {
        assert_eq!(webhook_id(&json!({"id": "evt_1", "type": "x"})), "evt_1");
        assert_eq!(webhook_id(&json!({"id": 42})), "42");
    }

    #[test]
    fn test_webhook_id_hashes_payload_without_id() {
        let a = webhook_id(&json!({"type": "payment_intent.succeeded", "amount": 10}));
        let b = webhook_id(&json!({"amount": 10, "type": "payment_intent.succeeded"}));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let c = webhook_id(&json!({"amount": 11, "type": "payment_intent.succeeded"}));
        assert_ne!(a, c);
    }

    #[test]
    fn test_webhook_id_ignores_nested_key_order() {
        let mut forward = serde_json::Map::new();
        forward.insert("b".to_string(), json!(1));
        forward.insert("a".to_string(), json!({"y": [1, 2], "x": null}));

        let mut backward = serde_json::Map::new();
        backward.insert("a".to_string(), json!({"x": null, "y": [1, 2]}));
        backward.insert("b".to_string(), json!(1));

        assert_eq!(
            webhook_id(&Value::Object(forward)),
            webhook_id(&Value::Object(backward))
        );
    }

    #[test]
    fn test_canonical_form_sorts_keys() {
        let mut map = serde_json::Map::new();
        map.insert("z".to_string(), json!(1));
        map.insert("a".to_string(), json!({"d": 2, "c": 3}));

        assert_eq!(
            canonicalize(&Value::Object(map)).to_string(),
            r#"{"a":{"c":3,"d":2},"z":1}"#
        );
    }

    #[test]
    fn test_empty_string_id_falls_back_to_hash() {
        assert_eq!(webhook_id(&json!({"id": ""})).len(), 64);
    }
}
