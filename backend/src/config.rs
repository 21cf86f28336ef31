//! Configuration management for the Liquor Inventory gateway
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides such as LIQ__SERVER__PORT

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Upstream liquor-shop API
    pub upstream: UpstreamConfig,

    /// Dashboard behaviour
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the upstream REST API
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    /// Shop id the upstream uses for the "all shops" view
    pub all_shops_id: i64,

    /// Page size when the request does not name one
    pub default_page_size: u32,

    /// Largest page size a request may ask for
    pub max_page_size: u32,

    /// Quantities below this are low stock
    pub low_stock_threshold: u64,

    /// How long shop and category registries stay fresh, in seconds
    pub registry_ttl_secs: u64,

    /// How long a stock snapshot is served without refetching, in seconds (0 = always refetch)
    pub snapshot_ttl_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("LIQ_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("upstream.base_url", "http://localhost:8080/api")?
            .set_default("upstream.timeout_secs", 15)?
            .set_default("dashboard.all_shops_id", shared::DEFAULT_ALL_SHOPS_ID)?
            .set_default("dashboard.default_page_size", 25)?
            .set_default("dashboard.max_page_size", shared::MAX_PAGE_SIZE)?
            .set_default("dashboard.low_stock_threshold", shared::LOW_STOCK_THRESHOLD)?
            .set_default("dashboard.registry_ttl_secs", 300)?
            .set_default("dashboard.snapshot_ttl_secs", 120)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (LIQ__ prefix)
            .add_source(
                Environment::with_prefix("LIQ")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            all_shops_id: shared::DEFAULT_ALL_SHOPS_ID,
            default_page_size: 25,
            max_page_size: shared::MAX_PAGE_SIZE,
            low_stock_threshold: shared::LOW_STOCK_THRESHOLD,
            registry_ttl_secs: 300,
            snapshot_ttl_secs: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let config = Config::load().unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.dashboard.all_shops_id, 6);
        assert_eq!(config.dashboard.default_page_size, 25);
        assert_eq!(config.dashboard.low_stock_threshold, 10);
        assert_eq!(config.dashboard.registry_ttl_secs, 300);
    }
}
