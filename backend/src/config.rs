//! Configuration management for the Acopio reconciliation service
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with ACOPIO_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration (run markers)
    #[validate]
    pub database: DatabaseConfig,

    /// Generic entity API holding products, containers and history
    #[validate]
    pub entity_api: EntityApiConfig,

    /// Reconciliation pass tuning
    #[validate]
    pub reconciliation: ReconciliationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[validate(length(min = 1))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct EntityApiConfig {
    /// Base URL, e.g. `https://api.example.com/apps/acopio`
    #[validate(url)]
    pub base_url: String,

    /// API key sent with every request
    pub api_key: String,

    /// Records requested per page; the API caps this server-side
    #[validate(range(min = 1, max = 5000))]
    pub page_size: u32,

    /// Pages read per collection before giving up
    #[validate(range(min = 1))]
    pub max_pages: u32,

    /// Per-request timeout in seconds
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ReconciliationConfig {
    /// Schema-version key of the one-time automatic pass
    #[validate(length(min = 1))]
    pub run_key: String,

    /// Entities corrected at the same time
    #[validate(range(min = 1, max = 64))]
    pub concurrency: usize,

    /// Stock differences at or below this many kg are not drift
    pub stock_tolerance_kg: Decimal,

    /// Run the one-time pass when the server starts
    pub run_on_startup: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("ACOPIO_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 5)?
            .set_default("database.min_connections", 1)?
            .set_default("entity_api.page_size", 500)?
            .set_default("entity_api.max_pages", 10_000)?
            .set_default("entity_api.timeout_secs", 30)?
            .set_default("reconciliation.run_key", "ledger-v1")?
            .set_default("reconciliation.concurrency", 3)?
            .set_default("reconciliation.stock_tolerance_kg", "0.01")?
            .set_default("reconciliation.run_on_startup", true)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (ACOPIO_ prefix)
            .add_source(
                Environment::with_prefix("ACOPIO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject values the reconciliation pass cannot run with
    pub fn validate_settings(&self) -> Result<(), AppError> {
        self.validate()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        if self.reconciliation.stock_tolerance_kg < Decimal::ZERO {
            return Err(AppError::Validation {
                field: "reconciliation.stock_tolerance_kg".to_string(),
                message: "Stock tolerance cannot be negative".to_string(),
                message_es: "La tolerancia de stock no puede ser negativa".to_string(),
            });
        }
        Ok(())
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

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            run_key: "ledger-v1".to_string(),
            concurrency: 3,
            stock_tolerance_kg: shared::ledger::DEFAULT_STOCK_TOLERANCE,
            run_on_startup: true,
        }
    }
}
