use crate::payments::PaymentOrchestrator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PaymentOrchestrator>,
    /// Reported by the health endpoint
    pub environment: String,
}

impl AppState {
    pub fn new(orchestrator: Arc<PaymentOrchestrator>, environment: impl Into<String>) -> Self {
        Self {
            orchestrator,
            environment: environment.into(),
        }
    }
}
