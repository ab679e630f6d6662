//! Provider selection
//!
//! Rules are applied in order: an available preferred provider wins, then
//! low-fee currencies, large amounts, small amounts and finally round-robin.

use crate::config::RoutingConfig;
use crate::error::{AppError, AppResult};
use crate::payments::traits::PaymentProvider;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Thresholds and preferences driving [`ProviderRouter::route`]
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub low_fee_currencies: Vec<String>,
    pub large_amount_threshold: Decimal,
    pub small_amount_threshold: Decimal,
    pub reliable_provider: String,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self::from(&RoutingConfig::default())
    }
}

impl From<&RoutingConfig> for RoutingPolicy {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            low_fee_currencies: config.low_fee_currencies.clone(),
            large_amount_threshold: Decimal::from(config.large_amount_threshold),
            small_amount_threshold: Decimal::from(config.small_amount_threshold),
            reliable_provider: config.reliable_provider.clone(),
        }
    }
}

pub struct ProviderRouter {
    /// Keyed by name so iteration order, and therefore selection, is deterministic
    providers: BTreeMap<String, Arc<dyn PaymentProvider>>,
    policy: RoutingPolicy,
    cursor: AtomicUsize,
}

impl ProviderRouter {
    pub fn new(providers: Vec<Arc<dyn PaymentProvider>>, policy: RoutingPolicy) -> Self {
        let providers = providers
            .into_iter()
            .map(|provider| (provider.name().to_string(), provider))
            .collect();

        Self {
            providers,
            policy,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Pick a provider for a charge
    pub fn route(
        &self,
        amount: &Decimal,
        currency: &str,
        preferred: Option<&str>,
    ) -> AppResult<Arc<dyn PaymentProvider>> {
        if let Some(provider) = preferred.and_then(|name| self.providers.get(name)) {
            if provider.is_available() {
                debug!(provider = %provider.name(), "Routing to preferred provider");
                return Ok(Arc::clone(provider));
            }
            debug!(provider = %provider.name(), "Preferred provider unavailable, applying policy");
        }

        let available = self.available_providers();
        if available.is_empty() {
            return Err(AppError::no_provider_available());
        }

        if self
            .policy
            .low_fee_currencies
            .iter()
            .any(|code| code.eq_ignore_ascii_case(currency))
        {
            return Ok(Self::lowest_fee(&available));
        }

        if *amount > self.policy.large_amount_threshold {
            if let Some(reliable) = available
                .iter()
                .find(|p| p.name() == self.policy.reliable_provider)
            {
                return Ok(Arc::clone(reliable));
            }
        }

        if *amount < self.policy.small_amount_threshold {
            return Ok(Self::lowest_fee(&available));
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % available.len();
        Ok(Arc::clone(&available[index]))
    }

    /// Currently available providers in name order
    pub fn available_providers(&self) -> Vec<Arc<dyn PaymentProvider>> {
        self.providers
            .values()
            .filter(|provider| provider.is_available())
            .cloned()
            .collect()
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn PaymentProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// First provider in name order among those sharing the minimum fee
    fn lowest_fee(available: &[Arc<dyn PaymentProvider>]) -> Arc<dyn PaymentProvider> {
        let mut best = &available[0];
        for provider in &available[1..] {
            if provider.fee_percentage() < best.fee_percentage() {
                best = provider;
            }
        }
        Arc::clone(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvidersConfig;
    use crate::payments::providers::{PayPalProvider, StripeProvider};

    struct Fixture {
        stripe: Arc<StripeProvider>,
        paypal: Arc<PayPalProvider>,
        router: ProviderRouter,
    }

    fn fixture() -> Fixture {
        let config = ProvidersConfig::instant();
        let stripe = Arc::new(StripeProvider::new(config.stripe));
        let paypal = Arc::new(PayPalProvider::new(config.paypal));
        let router = ProviderRouter::new(
            vec![
                stripe.clone() as Arc<dyn PaymentProvider>,
                paypal.clone() as Arc<dyn PaymentProvider>,
            ],
            RoutingPolicy::default(),
        );
        Fixture {
            stripe,
            paypal,
            router,
        }
    }

    fn usd(amount: i64) -> Decimal {
        Decimal::from(amount)
    }

    #[test]
    fn test_preferred_provider_honored() {
        let f = fixture();
        let chosen = f.router.route(&usd(100), "USD", Some("paypal")).unwrap();
        assert_eq!(chosen.name(), "paypal");
    }

    #[test]
    fn test_unavailable_preference_falls_back_to_policy() {
        let f = fixture();
        f.paypal.set_available(false);
        let chosen = f.router.route(&usd(5), "USD", Some("paypal")).unwrap();
        assert_eq!(chosen.name(), "stripe");
    }

    #[test]
    fn test_low_fee_currency_picks_cheapest() {
        let f = fixture();
        for _ in 0..4 {
            let chosen = f.router.route(&usd(500), "BRL", None).unwrap();
            assert_eq!(chosen.name(), "stripe");
        }
    }

    #[test]
    fn test_large_amount_prefers_reliable_provider() {
        let f = fixture();
        let chosen = f.router.route(&usd(20_000), "USD", None).unwrap();
        assert_eq!(chosen.name(), "stripe");
    }

    #[test]
    fn test_large_amount_without_reliable_provider_round_robins() {
        let f = fixture();
        f.stripe.set_available(false);
        let chosen = f.router.route(&usd(20_000), "USD", None).unwrap();
        assert_eq!(chosen.name(), "paypal");
    }

    #[test]
    fn test_round_robin_alternates_in_name_order() {
        let f = fixture();
        let picks: Vec<String> = (0..4)
            .map(|_| f.router.route(&usd(100), "USD", None).unwrap().name().to_string())
            .collect();
        assert_eq!(picks, vec!["paypal", "stripe", "paypal", "stripe"]);
    }

    #[test]
    fn test_no_providers_available() {
        let f = fixture();
        f.stripe.set_available(false);
        f.paypal.set_available(false);
        let err = f.router.route(&usd(100), "USD", None).err().unwrap();
        assert_eq!(err.public_message(), "No payment providers available");
    }

    #[test]
    fn test_lookup_by_name() {
        let f = fixture();
        assert!(f.router.by_name("stripe").is_some());
        assert!(f.router.by_name("square").is_none());
        assert!(f.router.is_registered("paypal"));
        assert_eq!(f.router.provider_names(), vec!["paypal", "stripe"]);
    }
}
