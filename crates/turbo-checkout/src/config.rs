//! Storefront configuration.

use crate::CheckoutError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use turbo_commerce::payment::PaymentProvider;
use turbo_commerce::{Currency, Money};

/// Top-level configuration, usually read from `turbo-checkout.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorefrontConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub liveness: LivenessConfig,

    #[serde(default)]
    pub payments: PaymentsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StorefrontConfig {
    /// Load config from a file. `.json` files are parsed as JSON, anything
    /// else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CheckoutError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CheckoutError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(|e| {
                CheckoutError::Config(format!("invalid JSON in {}: {}", path.display(), e))
            })?
        } else {
            Self::from_toml(&content).map_err(|e| {
                CheckoutError::Config(format!("{}: {}", path.display(), e))
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML without validating.
    pub fn from_toml(content: &str) -> Result<Self, CheckoutError> {
        toml::from_str(content).map_err(|e| CheckoutError::Config(format!("invalid TOML: {}", e)))
    }

    /// Serialize back to TOML.
    pub fn to_toml(&self) -> Result<String, CheckoutError> {
        toml::to_string_pretty(self).map_err(|e| CheckoutError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), CheckoutError> {
        let url = self.api.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CheckoutError::Config(format!(
                "api.base_url must be an http(s) URL, got {:?}",
                self.api.base_url
            )));
        }
        if self.api.timeout_ms == 0 {
            return Err(CheckoutError::Config("api.timeout_ms must be positive".into()));
        }
        if self.liveness.interval_secs == 0 || self.liveness.timeout_ms == 0 {
            return Err(CheckoutError::Config(
                "liveness.interval_secs and liveness.timeout_ms must be positive".into(),
            ));
        }
        if self.payments.cod_max_amount < 0.0 {
            return Err(CheckoutError::Config(
                "payments.cod_max_amount cannot be negative".into(),
            ));
        }
        self.payments.providers()?;
        Ok(())
    }
}

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Base URL the cart, coupon, order and payment paths are joined to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Where the cart cache and identity are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".turbo-checkout")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

/// Backend liveness polling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LivenessConfig {
    #[serde(default = "default_liveness_path")]
    pub path: String,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Bound on a single check.
    #[serde(default = "default_liveness_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_liveness_path() -> String {
    "/health".to_string()
}

fn default_interval_secs() -> u64 {
    30
}

fn default_liveness_timeout_ms() -> u64 {
    3_000
}

impl LivenessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            path: default_liveness_path(),
            interval_secs: default_interval_secs(),
            timeout_ms: default_liveness_timeout_ms(),
        }
    }
}

/// Payment settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub currency: Currency,

    /// Enabled providers, in display order. Empty enables every provider.
    #[serde(default)]
    pub providers: Vec<String>,

    /// Largest order total accepted for cash on delivery, in major units.
    #[serde(default = "default_cod_max_amount")]
    pub cod_max_amount: f64,
}

fn default_cod_max_amount() -> f64 {
    50_000.0
}

impl PaymentsConfig {
    /// Parse the configured providers.
    pub fn providers(&self) -> Result<Vec<PaymentProvider>, CheckoutError> {
        if self.providers.is_empty() {
            return Ok(PaymentProvider::ALL.to_vec());
        }
        let mut parsed: Vec<PaymentProvider> = Vec::with_capacity(self.providers.len());
        for raw in &self.providers {
            let provider: PaymentProvider = raw
                .parse()
                .map_err(|_| CheckoutError::Config(format!("unknown payment provider {:?}", raw)))?;
            if !parsed.contains(&provider) {
                parsed.push(provider);
            }
        }
        Ok(parsed)
    }

    pub fn cod_max(&self) -> Money {
        Money::from_decimal(self.cod_max_amount, self.currency)
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            providers: Vec::new(),
            cod_max_amount: default_cod_max_amount(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines (for log aggregation).
    Json,
    /// Human-readable (for development).
    #[default]
    Human,
}

/// Logging settings, consumed by the binary that installs the subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `turbo_checkout=debug`.
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = StorefrontConfig::from_toml("").unwrap();
        assert_eq!(config, StorefrontConfig::default());
        assert_eq!(config.liveness.timeout(), Duration::from_secs(3));
        assert_eq!(config.payments.providers().unwrap().len(), PaymentProvider::ALL.len());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let config = StorefrontConfig::from_toml(
            r#"
            [api]
            base_url = "https://shop.example.in/api"
            timeout_ms = 5000

            [storage]
            dir = "/tmp/cart"

            [payments]
            currency = "INR"
            providers = ["Google Pay", "phonepe", "stripe", "cod"]
            cod_max_amount = 2500

            [logging]
            level = "turbo_checkout=debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.timeout(), Duration::from_millis(5000));
        assert_eq!(config.storage.dir, PathBuf::from("/tmp/cart"));
        assert_eq!(
            config.payments.providers().unwrap(),
            vec![
                PaymentProvider::GooglePay,
                PaymentProvider::PhonePe,
                PaymentProvider::Stripe,
                PaymentProvider::CashOnDelivery
            ]
        );
        assert_eq!(config.payments.cod_max(), Money::from_major(2500, Currency::INR));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = StorefrontConfig::default();
        config.api.base_url = "localhost".to_string();
        assert!(matches!(config.validate(), Err(CheckoutError::Config(_))));

        let mut config = StorefrontConfig::default();
        config.payments.providers = vec!["bitcoin".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_json_and_toml_files() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("turbo-checkout.toml");
        std::fs::write(&toml_path, "[api]\nbase_url = \"http://127.0.0.1:8080\"\n").unwrap();
        let config = StorefrontConfig::load(&toml_path).unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:8080");

        let json_path = dir.path().join("turbo-checkout.json");
        std::fs::write(&json_path, r#"{"payments": {"cod_max_amount": 100}}"#).unwrap();
        let config = StorefrontConfig::load(&json_path).unwrap();
        assert_eq!(config.payments.cod_max_amount, 100.0);
    }
}
