use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError};

use crate::entities::order::{fits_amount_column, DEFAULT_SHIPPING_TOTAL};
use crate::identifiers::DEFAULT_MAX_ATTEMPTS;
use crate::services::order_ledger::DuplicateOrderPolicy;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_DATABASE_URL: &str = "sqlite://order_ledger.db?mode=rwc";
const CONFIG_DIR: &str = "config";
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Order ledger behaviour
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct LedgerConfig {
    /// Shipping charge applied to newly created orders
    #[serde(default = "default_shipping_total")]
    #[validate(custom = "validate_amount")]
    pub default_shipping_total: Decimal,

    /// What to do when several active created orders exist for one
    /// billing profile and cart
    #[serde(default)]
    pub duplicate_order_policy: DuplicateOrderPolicy,

    /// Identifier candidates tried for a new order before giving up
    #[serde(default = "default_order_id_max_attempts")]
    #[validate(range(min = 1, max = 100))]
    pub order_id_max_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_shipping_total: default_shipping_total(),
            duplicate_order_policy: DuplicateOrderPolicy::default(),
            order_id_max_attempts: default_order_id_max_attempts(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1, max = 512))]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Capacity of the domain event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1, max = 1_000_000))]
    pub event_channel_capacity: usize,

    #[serde(default)]
    #[validate]
    pub ledger: LedgerConfig,
}

impl AppConfig {
    /// Builds a configuration with defaults for everything except the
    /// database location and environment name.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            ledger: LedgerConfig::default(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_pool_bounds(&self) -> Result<(), AppConfigError> {
        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections_exceeds_max");
            err.message = Some(
                format!(
                    "db_min_connections ({}) must not exceed db_max_connections ({})",
                    self.db_min_connections, self.db_max_connections
                )
                .into(),
            );
            let mut errors = validator::ValidationErrors::new();
            errors.add("db_min_connections", err);
            return Err(AppConfigError::Validation(errors));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn validate_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("negative_amount"));
    }
    if !fits_amount_column(*value) {
        return Err(ValidationError::new("amount_out_of_range"));
    }
    Ok(())
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_shipping_total() -> Decimal {
    DEFAULT_SHIPPING_TOTAL
}

fn default_order_id_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("order_ledger={},sea_orm=warn,sqlx=warn", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*), `__` separating nested keys
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", DEFAULT_DATABASE_URL)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;
    app_config.validate_pool_bounds()?;

    info!(
        environment = %app_config.environment,
        duplicate_order_policy = %app_config.ledger.duplicate_order_policy,
        "Configuration loaded"
    );
    Ok(app_config)
}
