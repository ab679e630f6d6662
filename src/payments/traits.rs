//! Payment provider trait definitions
//!
//! Defines the common interface that all payment providers must implement.

use crate::error::AppResult;
use crate::payments::types::{NormalizedWebhook, PaymentRequest, ProviderOutcome};
use async_trait::async_trait;

/// Trait for payment provider implementations
///
/// The router selects among implementors by name, availability and fee; the
/// orchestrator only ever talks to a provider through this trait.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Stable lower-case identifier, used as the routing and persistence key
    fn name(&self) -> &str;

    /// Whether the provider currently accepts new charges
    fn is_available(&self) -> bool;

    /// Percentage fee charged per transaction
    fn fee_percentage(&self) -> f64;

    /// Charge the payment
    ///
    /// A declined or pending charge is a normal [`ProviderOutcome`]. An `Err`
    /// means the call itself failed and nothing is known about the charge.
    async fn execute(&self, request: &PaymentRequest) -> AppResult<ProviderOutcome>;

    /// Map a provider webhook body onto the common status vocabulary
    fn normalize_webhook(&self, payload: &serde_json::Value) -> NormalizedWebhook;

    /// Validate webhook signature
    ///
    /// Returns `true` when no webhook secret is configured. With a secret the
    /// signature must be present and match the raw body.
    fn verify_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> bool;
}
