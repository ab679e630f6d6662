//! Mock payment-processing backend
//!
//! Payments are created idempotently, routed to one of several simulated
//! providers, retried with bounded backoff and reconciled through
//! deduplicated provider webhooks.

pub mod api;
#[cfg(feature = "cache")]
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod payments;
pub mod telemetry;

pub use api::AppState;
pub use error::{AppError, AppResult};

/// The full HTTP application
pub fn app(state: AppState) -> axum::Router {
    api::router(state)
}
