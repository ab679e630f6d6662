use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub orchestrator: OrchestratorConfig,
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Retry loop bounds
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 5_000,
        }
    }
}

/// Provider selection heuristics
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    pub low_fee_currencies: Vec<String>,
    pub large_amount_threshold: u64,
    pub small_amount_threshold: u64,
    pub reliable_provider: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            low_fee_currencies: vec!["BRL".to_string()],
            large_amount_threshold: 10_000,
            small_amount_threshold: 10,
            reliable_provider: "stripe".to_string(),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid value, got '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

fn csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .context("PORT not set")?
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 20)?,
        };

        // Caching is optional; absent REDIS_URL means every read goes to Postgres
        let redis = env::var("REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| RedisConfig { url });

        let defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            max_attempts: env_or("MAX_PAYMENT_ATTEMPTS", defaults.max_attempts)?,
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms)?,
            retry_max_delay_ms: env_or("RETRY_MAX_DELAY_MS", defaults.retry_max_delay_ms)?,
        };

        let routing_defaults = RoutingConfig::default();
        let routing = RoutingConfig {
            low_fee_currencies: env::var("ROUTING_LOW_FEE_CURRENCIES")
                .map(|raw| csv(&raw))
                .unwrap_or(routing_defaults.low_fee_currencies),
            large_amount_threshold: env_or(
                "ROUTING_LARGE_AMOUNT_THRESHOLD",
                routing_defaults.large_amount_threshold,
            )?,
            small_amount_threshold: env_or(
                "ROUTING_SMALL_AMOUNT_THRESHOLD",
                routing_defaults.small_amount_threshold,
            )?,
            reliable_provider: env::var("ROUTING_RELIABLE_PROVIDER")
                .unwrap_or(routing_defaults.reliable_provider),
        };

        let config = Config {
            server,
            database,
            redis,
            orchestrator,
            routing,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(anyhow!("DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.orchestrator.max_attempts == 0 {
            return Err(anyhow!("MAX_PAYMENT_ATTEMPTS must be at least 1"));
        }

        if self.orchestrator.retry_max_delay_ms < self.orchestrator.retry_base_delay_ms {
            return Err(anyhow!(
                "RETRY_MAX_DELAY_MS ({}) must not be below RETRY_BASE_DELAY_MS ({})",
                self.orchestrator.retry_max_delay_ms,
                self.orchestrator.retry_base_delay_ms
            ));
        }

        if self.routing.small_amount_threshold >= self.routing.large_amount_threshold {
            return Err(anyhow!(
                "ROUTING_SMALL_AMOUNT_THRESHOLD must be below ROUTING_LARGE_AMOUNT_THRESHOLD"
            ));
        }

        Ok(())
    }
}

/// Behaviour of one mock provider
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProviderSettings {
    pub enabled: bool,
    pub fee_percentage: f64,
    /// Simulated network round trip
    pub latency_ms: u64,
    /// HMAC secret for webhook signatures; verification is skipped when unset
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl ProviderSettings {
    /// Secret with blank values treated as unset
    pub fn secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProvidersConfig {
    pub stripe: ProviderSettings,
    pub paypal: ProviderSettings,
}

impl ProvidersConfig {
    pub const ENV_PREFIX: &'static str = "PROVIDERS";

    /// Load from `config/providers.*` (optional) overlaid with `PROVIDERS__<NAME>__<KEY>` env vars
    pub fn load() -> Result<Self> {
        Self::from_sources(
            Some("config/providers"),
            config::Environment::with_prefix(Self::ENV_PREFIX),
        )
    }

    pub fn from_sources(file: Option<&str>, environment: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("stripe.enabled", true)?
            .set_default("stripe.fee_percentage", 2.9)?
            .set_default("stripe.latency_ms", 500_i64)?
            .set_default("paypal.enabled", true)?
            .set_default("paypal.fee_percentage", 3.4)?
            .set_default("paypal.latency_ms", 800_i64)?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(
                environment
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build provider configuration")?;

        let providers: ProvidersConfig = settings
            .try_deserialize()
            .context("Failed to deserialize provider configuration")?;

        providers.validate()?;
        Ok(providers)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, settings) in [("stripe", &self.stripe), ("paypal", &self.paypal)] {
            if !(0.0..100.0).contains(&settings.fee_percentage) {
                return Err(anyhow!(
                    "{} fee_percentage must be within [0, 100), got {}",
                    name,
                    settings.fee_percentage
                ));
            }
        }
        Ok(())
    }

    /// Fixtures with no simulated latency, for tests
    pub fn instant() -> Self {
        let defaults = Self::default();
        Self {
            stripe: ProviderSettings {
                latency_ms: 0,
                ..defaults.stripe
            },
            paypal: ProviderSettings {
                latency_ms: 0,
                ..defaults.paypal
            },
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            stripe: ProviderSettings {
                enabled: true,
                fee_percentage: 2.9,
                latency_ms: 500,
                webhook_secret: None,
            },
            paypal: ProviderSettings {
                enabled: true,
                fee_percentage: 3.4,
                latency_ms: 800,
                webhook_secret: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                environment: "development".to_string(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/payflow".to_string(),
                max_connections: 5,
            },
            redis: None,
            orchestrator: OrchestratorConfig::default(),
            routing: RoutingConfig::default(),
        }
    }

    fn env_source(pairs: &[(&str, &str)]) -> config::Environment {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ProvidersConfig::ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_privileged_port_rejected() {
        let mut config = valid_config();
        config.server.port = 80;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = valid_config();
        config.orchestrator.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_retry_delays_rejected() {
        let mut config = valid_config();
        config.orchestrator.retry_base_delay_ms = 1_000;
        config.orchestrator.retry_max_delay_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_csv_normalizes_currency_codes() {
        assert_eq!(csv(" brl, mxn ,,"), vec!["BRL".to_string(), "MXN".to_string()]);
    }

    #[test]
    fn test_provider_defaults_without_sources() {
        let providers = ProvidersConfig::from_sources(None, env_source(&[])).unwrap();
        assert_eq!(providers, ProvidersConfig::default());
    }

    #[test]
    fn test_provider_env_overrides() {
        let providers = ProvidersConfig::from_sources(
            None,
            env_source(&[
                ("PROVIDERS__PAYPAL__ENABLED", "false"),
                ("PROVIDERS__STRIPE__LATENCY_MS", "0"),
                ("PROVIDERS__STRIPE__WEBHOOK_SECRET", "whsec_test"),
            ]),
        )
        .unwrap();

        assert!(!providers.paypal.enabled);
        assert_eq!(providers.paypal.fee_percentage, 3.4);
        assert_eq!(providers.stripe.latency_ms, 0);
        assert_eq!(providers.stripe.secret(), Some("whsec_test"));
    }

    #[test]
    fn test_blank_secret_treated_as_unset() {
        let settings = ProviderSettings {
            enabled: true,
            fee_percentage: 1.0,
            latency_ms: 0,
            webhook_secret: Some("  ".to_string()),
        };
        assert_eq!(settings.secret(), None);
    }
}
