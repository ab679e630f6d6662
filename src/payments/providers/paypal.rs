//! PayPal mock provider

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

const SUPPORTED_CURRENCIES: [&str; 3] = ["USD", "EUR", "BRL"];

pub struct PayPalProvider {
    simulation: Simulation,
}

impl PayPalProvider {
    pub const NAME: &'static str = "paypal";

    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            simulation: Simulation::new(settings),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.simulation.set_available(available);
    }

    fn transaction_id() -> String {
        format!("PAYID-{}", random_alphanumeric(12).to_uppercase())
    }

    fn map_event(event_type: &str) -> Option<PaymentStatus> {
        match event_type {
            "PAYMENT.CAPTURE.COMPLETED" => Some(PaymentStatus::Success),
            "PAYMENT.CAPTURE.DENIED" => Some(PaymentStatus::Failed),
            "PAYMENT.CAPTURE.PENDING" => Some(PaymentStatus::Pending),
            "PAYMENT.CAPTURE.REVERSED" | "PAYMENT.CAPTURE.REFUNDED" => {
                Some(PaymentStatus::Cancelled)
            }
            _ => None,
        }
    }

    fn failed(provider_transaction_id: String, message: &str, code: &str, detail: &str) -> ProviderOutcome {
        ProviderOutcome {
            status: OutcomeStatus::Failed,
            provider_transaction_id: Some(provider_transaction_id),
            message: message.to_string(),
            raw_response: json!({
                "error": { "name": code, "message": detail }
            }),
        }
    }
}

#[async_trait]
impl PaymentProvider for PayPalProvider {
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
            "Processing PayPal payment"
        );

        self.simulation.round_trip().await;

        let provider_transaction_id = Self::transaction_id();

        if !SUPPORTED_CURRENCIES.contains(&request.currency.as_str()) {
            return Ok(Self::failed(
                provider_transaction_id,
                "Currency not supported",
                "CURRENCY_NOT_SUPPORTED",
                "Currency is not supported",
            ));
        }

        if request.amount < Decimal::ONE {
            return Ok(Self::failed(
                provider_transaction_id,
                "Amount too small",
                "AMOUNT_TOO_SMALL",
                "Minimum amount is 1.00",
            ));
        }

        if request.amount > Decimal::from(8_000) {
            return Ok(ProviderOutcome {
                status: OutcomeStatus::Pending,
                provider_transaction_id: Some(provider_transaction_id),
                message: "Payment under review".to_string(),
                raw_response: json!({
                    "status": "PENDING",
                    "status_details": { "reason": "PENDING_REVIEW" }
                }),
            });
        }

        let now = chrono::Utc::now().to_rfc3339();
        Ok(ProviderOutcome {
            status: OutcomeStatus::Success,
            provider_transaction_id: Some(provider_transaction_id),
            message: "Payment completed successfully".to_string(),
            raw_response: json!({
                "status": "COMPLETED",
                "amount": {
                    "currency_code": request.currency,
                    "value": format!("{:.2}", request.amount),
                },
                "create_time": now,
                "update_time": now,
            }),
        })
    }

    fn normalize_webhook(&self, payload: &serde_json::Value) -> NormalizedWebhook {
        let event_type = payload
            .get("event_type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let transaction_id = payload
            .pointer("/resource/id")
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
                signature::verify(secret, payload, signature, SignatureEncoding::Base64)
            }
            (Some(_), None) => false,
        }
    }
}
