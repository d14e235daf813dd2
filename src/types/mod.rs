//! Type definitions for patient input, predictions and assessments

pub mod assessment;
pub mod patient;
pub mod prediction;

pub use assessment::Assessment;
pub use patient::{PatientInput, PatientRecord};
pub use prediction::{PredictionResult, PredictionStatus, RiskLabel};
