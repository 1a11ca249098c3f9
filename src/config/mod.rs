//! Configuration management for PriceOracle
//!
//! Loads from YAML files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::oracle::sources::HttpSettings;
use crate::types::ProductDescriptor;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub oracle: OracleConfig,
    pub http: HttpConfig,
    /// Source definitions in registration order
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    pub pricing: PricingConfig,
    pub persistence: PersistenceConfig,
    pub scheduler: SchedulerConfig,
    pub chain: ChainConfig,
    pub logging: LoggingConfig,
    /// Product catalog
    #[serde(default)]
    pub products: Vec<ProductDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Quotes must be strictly above this after decay
    pub confidence_threshold: f64,
    /// Assumed when a source omits confidence
    pub default_confidence: f64,
    /// Confidence lost per hour of quote age
    pub decay_per_hour: f64,
    /// Floor for the decay multiplier
    pub min_decay_factor: f64,
    pub outlier_iqr_multiplier: f64,
    /// Below this many quotes outlier rejection is skipped
    pub min_outlier_samples: usize,
    /// Support band as a percentage of the final price
    pub support_tolerance_pct: f64,
    /// Upper bound for one source lookup in milliseconds
    pub source_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Concurrent requests in flight
    pub max_connections: usize,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Per-attempt timeout for page fetches
    pub page_timeout_ms: u64,
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    /// Display discount applied to the lowest price, in percent (truncated)
    pub margin_percent: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory
    pub data_dir: String,
    /// Enable CSV logging
    pub csv_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Seconds between catalog refreshes
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Submit prices on-chain
    pub enabled: bool,
    /// Target application id
    pub app_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines
    pub json: bool,
}

impl OracleConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
}

impl From<&HttpConfig> for HttpSettings {
    fn from(cfg: &HttpConfig) -> Self {
        Self {
            max_connections: cfg.max_connections,
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
            connect_timeout: Duration::from_millis(cfg.connect_timeout_ms),
            page_timeout: Duration::from_millis(cfg.page_timeout_ms),
            accept_invalid_certs: cfg.accept_invalid_certs,
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::builder()?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (PRICEORACLE_*)
            .add_source(Environment::with_prefix("PRICEORACLE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Built-in defaults only, no files or environment
    pub fn defaults() -> Result<Self> {
        let config = Self::builder()?
            .build()
            .context("Failed to build configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    fn builder() -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>> {
        let builder = Config::builder()
            // Oracle defaults
            .set_default("oracle.confidence_threshold", 0.9)?
            .set_default("oracle.default_confidence", 0.8)?
            .set_default("oracle.decay_per_hour", 0.05)?
            .set_default("oracle.min_decay_factor", 0.5)?
            .set_default("oracle.outlier_iqr_multiplier", 1.5)?
            .set_default("oracle.min_outlier_samples", 4)?
            .set_default("oracle.support_tolerance_pct", 1.0)?
            .set_default("oracle.source_timeout_ms", 15000)?
            // HTTP defaults
            .set_default("http.max_connections", 10)?
            .set_default("http.request_timeout_ms", 15000)?
            .set_default("http.connect_timeout_ms", 5000)?
            .set_default("http.page_timeout_ms", 12000)?
            .set_default("http.accept_invalid_certs", true)?
            // Pricing defaults
            .set_default("pricing.margin_percent", 3.0)?
            .set_default("pricing.currency", "INR")?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.csv_enabled", true)?
            // Scheduler defaults
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.interval_secs", 300)?
            // Chain defaults
            .set_default("chain.enabled", false)?
            .set_default("chain.app_id", 0)?
            // Logging defaults
            .set_default("logging.json", false)?;
        Ok(builder)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let o = &self.oracle;
        if !(0.0..=1.0).contains(&o.confidence_threshold) {
            bail!("oracle.confidence_threshold must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&o.default_confidence) {
            bail!("oracle.default_confidence must be within [0, 1]");
        }
        if o.decay_per_hour < 0.0 || !(0.0..=1.0).contains(&o.min_decay_factor) {
            bail!("oracle decay settings out of range");
        }
        if o.outlier_iqr_multiplier < 0.0 || o.support_tolerance_pct < 0.0 {
            bail!("oracle.outlier_iqr_multiplier and support_tolerance_pct must be non-negative");
        }
        if !(0.0..100.0).contains(&self.pricing.margin_percent) {
            bail!("pricing.margin_percent must be within [0, 100)");
        }
        if self.scheduler.interval_secs == 0 {
            bail!("scheduler.interval_secs must be positive");
        }
        for source in &self.sources {
            if source.name.trim().is_empty() {
                bail!("source entries need a name");
            }
        }
        Ok(())
    }

    /// Active catalog products
    pub fn active_products(&self) -> Vec<ProductDescriptor> {
        self.products.iter().filter(|p| p.active).cloned().collect()
    }

    /// Look up a catalog product by id
    pub fn product(&self, product_id: &str) -> Option<&ProductDescriptor> {
        self.products.iter().find(|p| p.product_id == product_id)
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        let sources: Vec<&str> = self
            .sources
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.name.as_str())
            .collect();
        format!(
            "sources={:?} products={} threshold={:.2} margin={}% interval={}s chain={}",
            sources,
            self.products.len(),
            self.oracle.confidence_threshold,
            self.pricing.margin_percent,
            self.scheduler.interval_secs,
            self.chain.enabled
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize() {
        let cfg = AppConfig::defaults().expect("defaults should load");
        assert_eq!(cfg.oracle.confidence_threshold, 0.9);
        assert_eq!(cfg.oracle.min_outlier_samples, 4);
        assert_eq!(cfg.http.max_connections, 10);
        assert_eq!(cfg.scheduler.interval_secs, 300);
        assert!(!cfg.chain.enabled);
        assert!(cfg.sources.is_empty());
        assert!(cfg.products.is_empty());
        cfg.validate().expect("defaults should validate");
    }

    #[test]
    fn http_settings_convert_from_millis() {
        let cfg = AppConfig::defaults().unwrap();
        let settings = HttpSettings::from(&cfg.http);
        assert_eq!(settings.request_timeout, Duration::from_secs(15));
        assert_eq!(settings.page_timeout, Duration::from_secs(12));
        assert_eq!(cfg.oracle.source_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn validation_rejects_bad_margin() {
        let mut cfg = AppConfig::defaults().unwrap();
        cfg.pricing.margin_percent = 100.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn digest_omits_disabled_sources() {
        let mut cfg = AppConfig::defaults().unwrap();
        let mut off = SourceConfig::new("ajio", SourceKind::ProductPage);
        off.enabled = false;
        cfg.sources = vec![SourceConfig::new("amazon", SourceKind::SearchApi), off];
        let digest = cfg.to_string();
        assert!(digest.contains("\"amazon\""));
        assert!(!digest.contains("ajio"));
    }
}
