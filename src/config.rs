use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const CONFIG_DIR: &str = "config";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_HORIZON_DAYS: u32 = 5;
const DEFAULT_LOOKBACK_WINDOW: u32 = 30;
const DEFAULT_COVER_DAYS: u32 = 7;
const DEFAULT_MIN_HISTORY_POINTS: u32 = 2;
const DEFAULT_PRODUCT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_CONCURRENCY: usize = 4;
const DEFAULT_URGENT_WITHIN_DAYS: u32 = 3;
const DEFAULT_WARNING_WITHIN_DAYS: u32 = 7;
const DEFAULT_REGULARIZATION: f64 = 0.01;

/// What to do when forecasting a single product fails unexpectedly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FailurePolicy {
    /// Record the product as skipped and keep going
    Skip,
    /// Fail the whole batch
    Abort,
}

/// Forecast and restock policy settings
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_status_thresholds"))]
pub struct ForecastConfig {
    /// Number of future daily periods to forecast
    #[serde(default = "default_horizon_days")]
    #[validate(range(min = 1, max = 366))]
    pub horizon_days: u32,

    /// Number of most recent observations used for the restock quantity
    #[serde(default = "default_lookback_window")]
    #[validate(range(min = 1))]
    pub lookback_window: u32,

    /// Days of demand a restock should cover
    #[serde(default = "default_cover_days")]
    #[validate(range(min = 1))]
    pub cover_days: u32,

    /// Minimum observations required to fit a product's model
    #[serde(default = "default_min_history_points")]
    #[validate(range(min = 2))]
    pub min_history_points: u32,

    #[serde(default = "default_failure_policy")]
    pub failure_policy: FailurePolicy,

    /// Per-product forecast timeout in seconds, 0 = disabled
    #[serde(default = "default_product_timeout_secs")]
    pub product_timeout_secs: u64,

    /// Maximum products forecast concurrently
    #[serde(default = "default_max_concurrency")]
    #[validate(range(min = 1))]
    pub max_concurrency: usize,

    /// Stock-outs within this many days are urgent
    #[serde(default = "default_urgent_within_days")]
    pub urgent_within_days: u32,

    /// Stock-outs within this many days are a warning
    #[serde(default = "default_warning_within_days")]
    pub warning_within_days: u32,

    /// Ridge penalty applied to trend and regressor coefficients
    #[serde(default = "default_regularization")]
    #[validate(custom = "validate_regularization")]
    pub regularization: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            lookback_window: default_lookback_window(),
            cover_days: default_cover_days(),
            min_history_points: default_min_history_points(),
            failure_policy: default_failure_policy(),
            product_timeout_secs: default_product_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            urgent_within_days: default_urgent_within_days(),
            warning_within_days: default_warning_within_days(),
            regularization: default_regularization(),
        }
    }
}

impl ForecastConfig {
    /// Per-product timeout, if enabled
    pub fn product_timeout(&self) -> Option<std::time::Duration> {
        (self.product_timeout_secs > 0)
            .then(|| std::time::Duration::from_secs(self.product_timeout_secs))
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Maximum upload size in bytes for the prediction endpoint
    #[serde(default = "default_max_upload_bytes")]
    #[validate(range(min = 1024))]
    pub max_upload_bytes: usize,

    /// Include diagnostic detail in error bodies; defaults to on in development
    #[serde(default)]
    pub expose_error_details: Option<bool>,

    #[serde(default)]
    #[validate]
    pub forecast: ForecastConfig,
}

impl AppConfig {
    /// Creates a new configuration with default forecast settings
    pub fn new(host: String, port: u16, environment: String) -> Self {
        Self {
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            max_upload_bytes: default_max_upload_bytes(),
            expose_error_details: None,
            forecast: ForecastConfig::default(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Whether error bodies should include diagnostic detail
    pub fn expose_error_details(&self) -> bool {
        self.expose_error_details
            .unwrap_or_else(|| self.is_development())
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
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

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}

fn default_lookback_window() -> u32 {
    DEFAULT_LOOKBACK_WINDOW
}

fn default_cover_days() -> u32 {
    DEFAULT_COVER_DAYS
}

fn default_min_history_points() -> u32 {
    DEFAULT_MIN_HISTORY_POINTS
}

fn default_failure_policy() -> FailurePolicy {
    FailurePolicy::Skip
}

fn default_product_timeout_secs() -> u64 {
    DEFAULT_PRODUCT_TIMEOUT_SECS
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_urgent_within_days() -> u32 {
    DEFAULT_URGENT_WITHIN_DAYS
}

fn default_warning_within_days() -> u32 {
    DEFAULT_WARNING_WITHIN_DAYS
}

fn default_regularization() -> f64 {
    DEFAULT_REGULARIZATION
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_regularization(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        let mut err = ValidationError::new("regularization");
        err.message = Some("regularization must be a finite, non-negative value".into());
        return Err(err);
    }
    Ok(())
}

fn validate_status_thresholds(cfg: &ForecastConfig) -> Result<(), ValidationError> {
    if cfg.urgent_within_days > cfg.warning_within_days {
        let mut err = ValidationError::new("status_thresholds");
        err.message = Some("urgent_within_days must not exceed warning_within_days".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("restock_predictor={},tower_http=debug", level);
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
/// 4. Environment variables (APP__*, nested with `__`, e.g. APP__FORECAST__HORIZON_DAYS)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Same layering as [`load_config`], reading files from `config_dir`
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
