//! Application configuration loaded from environment variables.

use std::time::Duration;

use engine::EngineConfig;
use payments::StripeConfig;
use thiserror::Error;

/// Webhook secret used with the in-memory provider when none is configured.
pub const DEV_WEBHOOK_SECRET: &str = "whsec_dev";

/// Configuration that cannot be served.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("WEBHOOK_SECRET must be set when STRIPE_SECRET_KEY is set")]
    MissingWebhookSecret,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL URL; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `STRIPE_SECRET_KEY`: provider API key; unset runs on the in-memory provider
/// - `STRIPE_API_BASE`: provider base URL (default: `"https://api.stripe.com"`)
/// - `WEBHOOK_SECRET`: webhook signing secret; required with `STRIPE_SECRET_KEY`,
///   otherwise defaults to `"whsec_dev"`
/// - `PAYMENT_CURRENCY`: currency of payment intents (default: `"usd"`)
/// - `PAYMENT_TIMEOUT_SECS`: provider call timeout (default: `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
    pub webhook_secret: Option<String>,
    pub payment_currency: String,
    pub payment_timeout_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Empty and unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: get("DATABASE_URL"),
            database_max_connections: get("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            stripe_api_base: get("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            webhook_secret: get("WEBHOOK_SECRET"),
            payment_currency: get("PAYMENT_CURRENCY").unwrap_or(defaults.payment_currency),
            payment_timeout_secs: get("PAYMENT_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.payment_timeout_secs),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Secret for verifying webhook signatures.
    ///
    /// The development default is only accepted with the in-memory provider.
    pub fn webhook_secret(&self) -> Result<String, ConfigError> {
        match (&self.webhook_secret, &self.stripe_secret_key) {
            (Some(secret), _) => Ok(secret.clone()),
            (None, None) => Ok(DEV_WEBHOOK_SECRET.to_string()),
            (None, Some(_)) => Err(ConfigError::MissingWebhookSecret),
        }
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        Ok(EngineConfig {
            currency: self.payment_currency.clone(),
            provider_timeout: Duration::from_secs(self.payment_timeout_secs),
            webhook_secret: self.webhook_secret()?,
        })
    }

    /// Stripe settings, if an API key is configured.
    pub fn stripe_config(&self) -> Option<StripeConfig> {
        self.stripe_secret_key.as_ref().map(|api_key| StripeConfig {
            api_key: api_key.clone(),
            base_url: self.stripe_api_base.clone(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 5,
            stripe_secret_key: None,
            stripe_api_base: "https://api.stripe.com".to_string(),
            webhook_secret: None,
            payment_currency: "usd".to_string(),
            payment_timeout_secs: 10,
        }
    }
}
