use config::{Config, ConfigError as LoadError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::ml::anomaly_detection::AnomalyThresholds;
use crate::ml::disposition::DispositionSettings;
use crate::ml::estimators::{
    ClassifierAlgorithm, ClassifierParams, RegressorAlgorithm, RegressorParams,
};
use crate::ml::forecasting::ForecastSettings;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_MODEL_PATH: &str = "models/smartreturns.json";
const DEFAULT_MAX_BATCH_SIZE: usize = 100;
const CONFIG_DIR: &str = "config";
const ENV_PREFIX: &str = "APP";

/// Disposition classifier configuration
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DispositionConfig {
    #[serde(default = "default_classifier")]
    #[validate(custom = "validate_classifier_algorithm")]
    pub algorithm: String,

    #[serde(default = "default_n_estimators")]
    #[validate(range(min = 1, max = 1000))]
    pub n_estimators: usize,

    #[serde(default = "default_classifier_depth")]
    #[validate(range(min = 1, max = 64))]
    pub max_depth: usize,

    #[serde(default = "default_min_samples_split")]
    #[validate(range(min = 2))]
    pub min_samples_split: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Held-out share of the labelled rows
    #[serde(default = "default_test_size")]
    #[validate(range(min = 0.05, max = 0.95))]
    pub test_size: f64,

    #[serde(default = "default_cv_folds")]
    #[validate(range(min = 2, max = 20))]
    pub cv_folds: usize,

    #[serde(default = "default_true")]
    pub balanced_class_weights: bool,
}

/// Demand forecaster configuration
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ForecastingConfig {
    #[serde(default = "default_regressor")]
    #[validate(custom = "validate_regressor_algorithm")]
    pub algorithm: String,

    #[serde(default = "default_n_estimators")]
    #[validate(range(min = 1, max = 1000))]
    pub n_estimators: usize,

    #[serde(default = "default_learning_rate")]
    #[validate(range(min = 0.001, max = 1.0))]
    pub learning_rate: f64,

    #[serde(default = "default_regressor_depth")]
    #[validate(range(min = 1, max = 64))]
    pub max_depth: usize,

    #[serde(default = "default_min_samples_split")]
    #[validate(range(min = 2))]
    pub min_samples_split: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Leading share of the series used for fitting, the rest is holdout
    #[serde(default = "default_train_fraction")]
    #[validate(range(min = 0.05, max = 0.95))]
    pub train_fraction: f64,

    #[serde(default = "default_max_periods")]
    #[validate(range(min = 1, max = 24))]
    pub max_periods: u32,
}

/// Anomaly detection thresholds
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AnomalyConfig {
    #[serde(default = "default_z_threshold")]
    #[validate(range(min = 0.1, max = 10.0))]
    pub z_threshold: f64,

    #[serde(default = "default_category_deviation")]
    #[validate(range(min = 0.01, max = 10.0))]
    pub category_deviation_threshold: f64,
}

/// Engine configuration
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Where `save_models` / `load_models` read and write by default
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Upper bound on records accepted by one batch prediction
    #[serde(default = "default_max_batch_size")]
    #[validate(range(min = 1, max = 10000))]
    pub max_batch_size: usize,

    #[serde(default)]
    #[validate]
    pub disposition: DispositionConfig,

    #[serde(default)]
    #[validate]
    pub forecasting: ForecastingConfig,

    #[serde(default)]
    #[validate]
    pub anomaly: AnomalyConfig,
}

impl Default for DispositionConfig {
    fn default() -> Self {
        Self {
            algorithm: default_classifier(),
            n_estimators: default_n_estimators(),
            max_depth: default_classifier_depth(),
            min_samples_split: default_min_samples_split(),
            seed: default_seed(),
            test_size: default_test_size(),
            cv_folds: default_cv_folds(),
            balanced_class_weights: true,
        }
    }
}

impl Default for ForecastingConfig {
    fn default() -> Self {
        Self {
            algorithm: default_regressor(),
            n_estimators: default_n_estimators(),
            learning_rate: default_learning_rate(),
            max_depth: default_regressor_depth(),
            min_samples_split: default_min_samples_split(),
            seed: default_seed(),
            train_fraction: default_train_fraction(),
            max_periods: default_max_periods(),
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: default_z_threshold(),
            category_deviation_threshold: default_category_deviation(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            model_path: default_model_path(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            disposition: DispositionConfig::default(),
            forecasting: ForecastingConfig::default(),
            anomaly: AnomalyConfig::default(),
        }
    }
}

impl From<&DispositionConfig> for DispositionSettings {
    fn from(config: &DispositionConfig) -> Self {
        Self {
            algorithm: config.algorithm.clone(),
            params: ClassifierParams {
                n_estimators: config.n_estimators,
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                seed: config.seed,
                balanced_class_weights: config.balanced_class_weights,
            },
            test_size: config.test_size,
            cv_folds: config.cv_folds,
        }
    }
}

impl From<&ForecastingConfig> for ForecastSettings {
    fn from(config: &ForecastingConfig) -> Self {
        Self {
            algorithm: config.algorithm.clone(),
            params: RegressorParams {
                n_estimators: config.n_estimators,
                learning_rate: config.learning_rate,
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                seed: config.seed,
            },
            train_fraction: config.train_fraction,
            max_periods: config.max_periods,
        }
    }
}

impl From<&AnomalyConfig> for AnomalyThresholds {
    fn from(config: &AnomalyConfig) -> Self {
        Self {
            z_threshold: config.z_threshold,
            category_deviation_threshold: config.category_deviation_threshold,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] LoadError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_classifier() -> String {
    "random_forest".to_string()
}

fn default_regressor() -> String {
    "gradient_boosting".to_string()
}

fn default_n_estimators() -> usize {
    100
}

fn default_classifier_depth() -> usize {
    10
}

fn default_regressor_depth() -> usize {
    6
}

fn default_min_samples_split() -> usize {
    2
}

fn default_seed() -> u64 {
    42
}

fn default_test_size() -> f64 {
    0.2
}

fn default_cv_folds() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_train_fraction() -> f64 {
    0.8
}

fn default_max_periods() -> u32 {
    24
}

fn default_z_threshold() -> f64 {
    2.5
}

fn default_category_deviation() -> f64 {
    0.5
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

fn validate_classifier_algorithm(name: &str) -> Result<(), ValidationError> {
    if ClassifierAlgorithm::parse(name).is_ok() {
        Ok(())
    } else {
        let mut err = ValidationError::new("algorithm");
        err.message = Some("Must be one of: random_forest, decision_tree".into());
        Err(err)
    }
}

fn validate_regressor_algorithm(name: &str) -> Result<(), ValidationError> {
    if RegressorAlgorithm::parse(name).is_ok() {
        Ok(())
    } else {
        let mut err = ValidationError::new("algorithm");
        err.message = Some("Must be one of: gradient_boosting, decision_tree".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("smartreturns_engine={},smartreturns={}", level, level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::new(filter_directive);

    // try_init: a second call (tests, embedding) keeps the first subscriber
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads engine configuration from `./config`, using `RUN_ENV` (or `APP_ENV`) to
/// pick the environment profile.
pub fn load_config() -> Result<EngineConfig, EngineConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

fn profile_path(config_dir: &Path, profile: &str) -> String {
    config_dir.join(profile).to_string_lossy().into_owned()
}

/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. `{config_dir}/default.toml`
/// 3. `{config_dir}/{run_env}.toml`
/// 4. Environment variables (`APP__*`, `__` separating nested keys)
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<EngineConfig, EngineConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("model_path", DEFAULT_MODEL_PATH)?
        .set_default("max_batch_size", DEFAULT_MAX_BATCH_SIZE as i64)?
        .add_source(File::with_name(&profile_path(config_dir, "default")).required(false))
        .add_source(File::with_name(&profile_path(config_dir, run_env)).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let engine_config: EngineConfig = config.try_deserialize()?;

    engine_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        EngineConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(engine_config)
}
