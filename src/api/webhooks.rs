use super::models::ApiResponse;
use super::AppState;
use crate::error::AppError;
use crate::payments::types::WebhookResult;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use http::HeaderName;

pub const SIGNATURE_HEADER: HeaderName = HeaderName::from_static("x-webhook-signature");

pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/:provider", post(receive_webhook))
}

/// Signature checks need the body exactly as sent, so it is taken as raw bytes
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookResult>>, AppError> {
    let signature = headers
        .get(&SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let result = state
        .orchestrator
        .apply_webhook(&provider, &body, signature)
        .await?;

    Ok(Json(ApiResponse::ok(result)))
}
