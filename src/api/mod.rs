//! HTTP surface
//!
//! Thin axum handlers over [`crate::payments::PaymentOrchestrator`]. Every
//! route lives under `/api`.

pub mod health;
pub mod models;
pub mod payments;
pub mod state;
pub mod webhooks;

use crate::error::{AppError, AppErrorKind, DomainError, ExternalError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use models::ErrorResponse;
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(payments::routes())
        .merge(webhooks::routes())
        .merge(health::routes());

    Router::new()
        .nest("/api", api)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppErrorKind::Domain(e) => match e {
                DomainError::PaymentNotFound { .. } => StatusCode::NOT_FOUND,
                DomainError::UnknownProvider { .. } => StatusCode::BAD_REQUEST,
                DomainError::InvalidWebhookSignature { .. } => StatusCode::UNAUTHORIZED,
                DomainError::InvalidWebhookPayload { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            },
            AppErrorKind::External(e) => match e {
                ExternalError::NoProviderAvailable => StatusCode::SERVICE_UNAVAILABLE,
                ExternalError::PaymentProvider { .. } => StatusCode::BAD_GATEWAY,
            },
            AppErrorKind::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(ErrorResponse {
            success: false,
            error: self.public_message(),
        });

        (status, body).into_response()
    }
}
