use super::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub database: String,
    pub providers: Vec<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let version = env!("CARGO_PKG_VERSION").to_string();

    let (status, database) = match state.orchestrator.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::error!(error = %e, "Health check: store unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "error")
        }
    };

    let response = HealthResponse {
        status: if status.is_success() {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        version,
        environment: state.environment.clone(),
        database: database.to_string(),
        providers: state
            .orchestrator
            .router()
            .available_providers()
            .iter()
            .map(|p| p.name().to_string())
            .collect(),
    };

    (status, Json(response))
}
