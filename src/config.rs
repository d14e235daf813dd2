//! Configuration management for the stroke risk engine

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "STROKE_RISK_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub models: ModelsConfig,
    pub validation: ValidationDataConfig,
    #[serde(default)]
    pub assessment: AssessmentConfig,
    pub logging: LoggingConfig,
}

/// A model artifact and the name it is reported under
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    /// File name relative to `models_dir`
    pub file: String,
}

impl ModelSpec {
    pub fn new(name: &str, file: &str) -> Self {
        Self {
            name: name.to_string(),
            file: file.to_string(),
        }
    }
}

/// ML models configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing ONNX model files
    pub models_dir: String,
    /// Model used for single-patient predictions
    pub primary: ModelSpec,
    /// Models compared side by side during analysis
    #[serde(default)]
    pub comparison: Vec<ModelSpec>,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Offline validation data
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationDataConfig {
    /// CSV of encoded features plus the target column
    pub path: String,
    #[serde(default = "default_target_column")]
    pub target_column: String,
}

fn default_target_column() -> String {
    "stroke".to_string()
}

/// Thresholds used when interpreting risk, in percentage points
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AssessmentConfig {
    /// Consensus risk above this is moderate
    pub moderate_risk_percent: f64,
    /// Consensus risk above this is high
    pub high_risk_percent: f64,
    /// What-if changes above this are flagged as significant
    pub significant_change_percent: f64,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            moderate_risk_percent: 15.0,
            high_risk_percent: 30.0,
            significant_change_percent: 5.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `$STROKE_RISK_CONFIG`, falling back to the default path
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from_path(path),
            Err(_) => Self::load_from_path(DEFAULT_CONFIG_PATH),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: ModelsConfig {
                models_dir: "models".to_string(),
                primary: ModelSpec::new("Ensemble", "strokerisk_tune_ensemble_model.onnx"),
                comparison: vec![
                    ModelSpec::new("Random Forest", "strokerisk_model_rf.onnx"),
                    ModelSpec::new("XGBoost", "strokerisk_model_xgboost.onnx"),
                    ModelSpec::new("Extra Trees", "strokerisk_model_et.onnx"),
                ],
                onnx_threads: 1,
            },
            validation: ValidationDataConfig {
                path: "data/stroke_data_smoted_scaled_for_pycaret.csv".to_string(),
                target_column: default_target_column(),
            },
            assessment: AssessmentConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
