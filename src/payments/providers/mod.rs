//! Payment provider implementations
//!
//! Both providers are deterministic mocks: the outcome of a charge depends only
//! on its amount and currency, and the network round trip is a configurable sleep.

pub mod paypal;
pub mod stripe;

pub use paypal::PayPalProvider;
pub use stripe::StripeProvider;

use crate::config::{ProviderSettings, ProvidersConfig};
use crate::payments::traits::PaymentProvider;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Availability flag and simulated latency shared by the mock providers
#[derive(Debug)]
pub(crate) struct Simulation {
    settings: ProviderSettings,
    available: AtomicBool,
}

impl Simulation {
    pub(crate) fn new(settings: ProviderSettings) -> Self {
        let available = AtomicBool::new(settings.enabled);
        Self {
            settings,
            available,
        }
    }

    pub(crate) fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub(crate) fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub(crate) async fn round_trip(&self) {
        if self.settings.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settings.latency_ms)).await;
        }
    }
}

pub(crate) fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Instantiate every configured provider, disabled ones included
pub fn build_providers(config: &ProvidersConfig) -> Vec<Arc<dyn PaymentProvider>> {
    let stripe: Arc<dyn PaymentProvider> = Arc::new(StripeProvider::new(config.stripe.clone()));
    let paypal: Arc<dyn PaymentProvider> = Arc::new(PayPalProvider::new(config.paypal.clone()));
    vec![stripe, paypal]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_providers_registers_both() {
        let providers = build_providers(&ProvidersConfig::instant());
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["stripe", "paypal"]);
    }

    #[test]
    fn test_disabled_provider_starts_unavailable() {
        let mut config = ProvidersConfig::instant();
        config.paypal.enabled = false;
        let providers = build_providers(&config);
        assert!(providers[0].is_available());
        assert!(!providers[1].is_available());
    }

    #[test]
    fn test_random_alphanumeric_length() {
        let id = random_alphanumeric(24);
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
