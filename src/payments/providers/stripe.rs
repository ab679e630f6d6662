//! Stripe mock provider
//!
//! Declines charges above 10 000, holds charges above 5 000 as pending and
//! accepts everything else. Webhook signatures are hex HMAC-SHA256.

use crate::config::ProviderSettings;
use crate::database::models::PaymentStatus;
use crate::error::AppResult;
use crate::payments::providers::{random_alphanumeric, Simulation};
use crate::payments::signature::{self, SignatureEncoding};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{NormalizedWebhook, OutcomeStatus, PaymentRequest, ProviderOutcome};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;

pub struct StripeProvider {
    simulation: Simulation,
}

impl StripeProvider {
    pub const NAME: &'static str = "stripe";

    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            simulation: Simulation::new(settings),
        }
    }

    /// Toggle availability at runtime (outage simulation)
    pub fn set_available(&self, available: bool) {
        self.simulation.set_available(available);
    }

    fn transaction_id() -> String {
        format!("pi_{}", random_alphanumeric(24))
    }

    fn map_event(event_type: &str) -> Option<PaymentStatus> {
        match event_type {
            "payment_intent.succeeded" => Some(PaymentStatus::Success),
            "payment_intent.payment_failed" => Some(PaymentStatus::Failed),
            "payment_intent.canceled" => Some(PaymentStatus::Cancelled),
            "payment_intent.processing" => Some(PaymentStatus::Pending),
            _ => None,
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_available(&self) -> bool {
        self.simulation.is_available()
    }

    fn fee_percentage(&self) -> f64 {
        self.simulation.settings().fee_percentage
    }

    async fn execute(&self, request: &PaymentRequest) -> AppResult<ProviderOutcome> {
        info!(
            provider = Self::NAME,
            amount = %request.amount,
            currency = %request.currency,
            idempotency_key = %request.idempotency_key,
            "Processing Stripe payment"
        );

        self.simulation.round_trip().await;

        let provider_transaction_id = Self::transaction_id();

        let outcome = if request.amount > Decimal::from(10_000) {
            ProviderOutcome {
                status: OutcomeStatus::Failed,
                provider_transaction_id: Some(provider_transaction_id),
                message: "Payment declined by issuer".to_string(),
                raw_response: json!({
                    "error": {
                        "type": "card_error",
                        "code": "card_declined",
                        "decline_code": "generic_decline"
                    }
                }),
            }
        } else if request.amount > Decimal::from(5_000) {
            ProviderOutcome {
                status: OutcomeStatus::Pending,
                provider_transaction_id: Some(provider_transaction_id),
                message: "Payment is being processed".to_string(),
                raw_response: json!({
                    "status": "processing",
                    "next_action": { "type": "3d_secure_redirect" }
                }),
            }
        } else {
            // Stripe reports amounts in minor units
            let amount_received = (request.amount * Decimal::from(100)).round();
            ProviderOutcome {
                status: OutcomeStatus::Success,
                provider_transaction_id: Some(provider_transaction_id),
                message: "Payment processed successfully".to_string(),
                raw_response: json!({
                    "status": "succeeded",
                    "amount_received": amount_received.to_string(),
                    "currency": request.currency.to_lowercase(),
                    "created": chrono::Utc::now().timestamp(),
                }),
            }
        };

        Ok(outcome)
    }

    fn normalize_webhook(&self, payload: &serde_json::Value) -> NormalizedWebhook {
        let event_type = payload
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let transaction_id = payload
            .pointer("/data/object/id")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        NormalizedWebhook {
            status: Self::map_event(&event_type),
            transaction_id,
            event_type,
        }
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> bool {
        match (self.simulation.settings().secret(), signature) {
            (None, _) => true,
            (Some(secret), Some(signature)) => {
                signature::verify(secret, payload, signature, SignatureEncoding::Hex)
            }
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvidersConfig;

    fn provider() -> StripeProvider {
        StripeProvider::new(ProvidersConfig::instant().stripe)
    }

    fn request(amount: Decimal) -> PaymentRequest {
        PaymentRequest {
            amount,
            currency: "USD".to_string(),
            payment_method: "card".to_string(),
            customer_data: json!({"email": "buyer@example.com"}),
            description: None,
            metadata: json!({}),
            idempotency_key: "stripe-test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_amount_thresholds() {
        let stripe = provider();

        let ok = stripe.execute(&request(Decimal::new(2500, 2))).await.unwrap();
        assert_eq!(ok.status, OutcomeStatus::Success);
        assert_eq!(ok.message, "Payment processed successfully");
        assert_eq!(ok.raw_response["amount_received"], "2500");

        let held = stripe.execute(&request(Decimal::from(5_001))).await.unwrap();
        assert_eq!(held.status, OutcomeStatus::Pending);

        // Exactly 10 000 is still only pending
        let edge = stripe.execute(&request(Decimal::from(10_000))).await.unwrap();
        assert_eq!(edge.status, OutcomeStatus::Pending);

        let declined = stripe.execute(&request(Decimal::from(15_000))).await.unwrap();
        assert_eq!(declined.status, OutcomeStatus::Failed);
        assert_eq!(declined.message, "Payment declined by issuer");
    }

    #[tokio::test]
    async fn test_transaction_id_shape() {
        let outcome = provider()
            .execute(&request(Decimal::from(10)))
            .await
            .unwrap();
        let id = outcome.provider_transaction_id.unwrap();
        assert!(id.starts_with("pi_"));
        assert_eq!(id.len(), 27);
    }

    #[test]
    fn test_normalize_webhook() {
        let normalized = provider().normalize_webhook(&json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_abc" } }
        }));
        assert_eq!(normalized.status, Some(PaymentStatus::Success));
        assert_eq!(normalized.transaction_id.as_deref(), Some("pi_abc"));
        assert_eq!(normalized.event_type, "payment_intent.succeeded");

        let unmapped = provider().normalize_webhook(&json!({"type": "charge.refunded"}));
        assert_eq!(unmapped.status, None);
        assert_eq!(unmapped.transaction_id, None);
    }

    #[test]
    fn test_signature_required_only_with_secret() {
        let body = br#"{"id":"evt_1"}"#;
        assert!(provider().verify_webhook_signature(body, None));

        let mut settings = ProvidersConfig::instant().stripe;
        settings.webhook_secret = Some("whsec_test".to_string());
        let secured = StripeProvider::new(settings);

        let good = signature::sign("whsec_test", body, SignatureEncoding::Hex);
        assert!(secured.verify_webhook_signature(body, Some(&good)));
        assert!(!secured.verify_webhook_signature(body, Some("deadbeef")));
        assert!(!secured.verify_webhook_signature(body, None));
    }

    #[test]
    fn test_availability_toggle() {
        let stripe = provider();
        assert!(stripe.is_available());
        stripe.set_available(false);
        assert!(!stripe.is_available());
    }
}
