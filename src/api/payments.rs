use super::models::{ApiResponse, CreatePaymentRequest, PaginationParams};
use super::AppState;
use crate::error::{AppError, DomainError};
use crate::payments::types::{PaymentDetail, PaymentPage, PaymentResult};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use http::HeaderName;
use std::sync::Arc;
use uuid::Uuid;

pub const IDEMPOTENCY_KEY_HEADER: HeaderName = HeaderName::from_static("idempotency-key");

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments", get(list_payments).post(create_payment))
        .route("/payments/:id", get(get_payment))
}

fn header_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(&IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentResult>>), AppError> {
    let Json(body) = body.map_err(|rejection| AppError::validation(rejection.body_text()))?;

    let fallback_key = header_key(&headers).unwrap_or_else(|| Uuid::new_v4().to_string());
    let (request, provider) = body.into_payment_request(fallback_key)?;

    // Detached so a dropped connection cannot stop the payment mid-attempt
    let orchestrator = Arc::clone(&state.orchestrator);
    let result = tokio::spawn(async move {
        orchestrator.submit(request, provider.as_deref()).await
    })
    .await??;

    let status = if result.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let message = result.message.clone();

    Ok((status, Json(ApiResponse::ok(result).with_message(message))))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaymentPage>>, AppError> {
    let page = state
        .orchestrator
        .list_payments(params.page(), params.per_page())
        .await?;

    Ok(Json(ApiResponse::ok(page)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PaymentDetail>>, AppError> {
    // A malformed id can never name a stored payment
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::domain(DomainError::PaymentNotFound { id: Uuid::nil() }))?;

    let detail = state.orchestrator.get_payment(id).await?;

    Ok(Json(ApiResponse::ok(detail)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_key_trimmed_and_non_empty() {
        let mut headers = HeaderMap::new();
        assert_eq!(header_key(&headers), None);

        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static("  "));
        assert_eq!(header_key(&headers), None);

        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static(" order-7 "));
        assert_eq!(header_key(&headers).as_deref(), Some("order-7"));
    }
}
