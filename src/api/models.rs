//! Request and response bodies for the HTTP API

use crate::error::{AppError, AppResult};
use crate::payments::orchestrator::DEFAULT_PAGE_SIZE;
use crate::payments::types::PaymentRequest;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use validator::{Validate, ValidateLength, ValidationError};

fn currency_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z]{3}$").expect("currency pattern is valid"))
}

fn validate_amount(amount: &Decimal) -> Result<(), ValidationError> {
    let min = Decimal::new(1, 2);
    let max = Decimal::new(99_999_999, 2);

    if *amount < min || *amount > max {
        return Err(ValidationError::new("amount_range")
            .with_message("amount must be between 0.01 and 999999.99".into()));
    }
    if amount.normalize().scale() > 2 {
        return Err(ValidationError::new("amount_precision")
            .with_message("amount must have at most two decimal places".into()));
    }
    Ok(())
}

fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if currency_pattern().is_match(currency) {
        Ok(())
    } else {
        Err(ValidationError::new("currency_format")
            .with_message("currency must be a three-letter ISO code".into()))
    }
}

fn validate_object(value: &Value) -> Result<(), ValidationError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ValidationError::new("not_an_object").with_message("must be a JSON object".into()))
    }
}

const IDEMPOTENCY_KEY_MAX_LEN: u64 = 255;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Body of `POST /api/payments`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[validate(custom(function = "validate_amount"))]
    pub amount: Decimal,

    #[validate(custom(function = "validate_currency"))]
    pub currency: String,

    #[validate(length(min = 1, max = 50))]
    pub payment_method: String,

    #[validate(custom(function = "validate_object"))]
    pub customer_data: Value,

    #[validate(length(max = 255))]
    pub description: Option<String>,

    #[serde(default = "empty_object")]
    #[validate(custom(function = "validate_object"))]
    pub metadata: Value,

    /// Preferred provider name
    #[validate(length(min = 1, max = 50))]
    pub provider: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub idempotency_key: Option<String>,
}

impl CreatePaymentRequest {
    /// Validate and convert into the orchestrator's request type.
    ///
    /// `fallback_key` is used when the body carries no idempotency key. The
    /// resolved key is held to the same limits whichever source it came from.
    pub fn into_payment_request(self, fallback_key: String) -> AppResult<(PaymentRequest, Option<String>)> {
        self.validate()
            .map_err(|e| AppError::validation(format!("Request validation failed: {}", e)))?;

        let idempotency_key = self.idempotency_key.unwrap_or(fallback_key);
        if !idempotency_key.validate_length(Some(1), Some(IDEMPOTENCY_KEY_MAX_LEN), None) {
            return Err(AppError::validation(format!(
                "Request validation failed: idempotency_key must be between 1 and {} characters",
                IDEMPOTENCY_KEY_MAX_LEN
            )));
        }

        let request = PaymentRequest {
            amount: self.amount,
            currency: self.currency.to_uppercase(),
            payment_method: self.payment_method,
            customer_data: self.customer_data,
            description: self.description,
            metadata: self.metadata,
            idempotency_key,
        };

        Ok((request, self.provider))
    }
}

/// `?page=&per_page=` for listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PaginationParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

/// Envelope shared by every JSON response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(overrides: Value) -> CreatePaymentRequest {
        let mut base = json!({
            "amount": "25.00",
            "currency": "usd",
            "payment_method": "card",
            "customer_data": {"email": "buyer@example.com"}
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_valid_request_converts() {
        let (request, provider) = body(json!({"provider": "stripe"}))
            .into_payment_request("generated".to_string())
            .unwrap();
        assert_eq!(request.currency, "USD");
        assert_eq!(request.idempotency_key, "generated");
        assert_eq!(request.metadata, json!({}));
        assert_eq!(provider.as_deref(), Some("stripe"));
    }

    #[test]
    fn test_numeric_amount_accepted() {
        let request = body(json!({"amount": 10.5}));
        assert_eq!(request.amount, Decimal::new(105, 1));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_amount_bounds() {
        assert!(body(json!({"amount": "0"})).validate().is_err());
        assert!(body(json!({"amount": "0.01"})).validate().is_ok());
        assert!(body(json!({"amount": "999999.99"})).validate().is_ok());
        assert!(body(json!({"amount": "1000000"})).validate().is_err());
        assert!(body(json!({"amount": "1.005"})).validate().is_err());
    }

    #[test]
    fn test_currency_must_be_three_letters() {
        assert!(body(json!({"currency": "US"})).validate().is_err());
        assert!(body(json!({"currency": "US1"})).validate().is_err());
    }

    #[test]
    fn test_customer_data_must_be_object() {
        assert!(body(json!({"customer_data": "buyer"})).validate().is_err());
    }

    #[test]
    fn test_description_length_limit() {
        let long = "x".repeat(256);
        assert!(body(json!({"description": long})).validate().is_err());
    }

    #[test]
    fn test_body_key_wins_over_fallback() {
        let (request, _) = body(json!({"idempotency_key": "client-key"}))
            .into_payment_request("generated".to_string())
            .unwrap();
        assert_eq!(request.idempotency_key, "client-key");
    }

    #[test]
    fn test_oversized_fallback_key_rejected() {
        let err = body(json!({}))
            .into_payment_request("k".repeat(256))
            .unwrap_err();
        assert!(err.to_string().contains("idempotency_key"));

        let (request, _) = body(json!({}))
            .into_payment_request("k".repeat(255))
            .unwrap();
        assert_eq!(request.idempotency_key.len(), 255);
    }

    #[test]
    fn test_pagination_defaults() {
        let params = PaginationParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), 10);
    }
}
