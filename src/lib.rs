//! Stroke Risk Library
//!
//! Turns raw clinical attributes into the standardized, one-hot-encoded
//! feature vector the stroke classifiers were trained on, and runs those
//! classifiers to produce risk predictions, model comparisons and offline
//! evaluations.

pub mod config;
pub mod error;
pub mod evaluation;
pub mod insights;
pub mod logging;
pub mod models;
pub mod preprocessor;
pub mod types;

pub use config::AppConfig;
pub use error::ValidationError;
pub use models::comparison::ModelComparison;
pub use models::inference::StrokePredictor;
pub use models::loader::ModelLoader;
pub use preprocessor::FeaturePreprocessor;
pub use types::{assessment::Assessment, patient::PatientInput, prediction::PredictionResult};
