//! Prediction result data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome flag callers check before reading a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Success,
    Error,
}

/// Human readable risk label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLabel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "High Risk")]
    High,
    Error,
}

impl RiskLabel {
    /// Label for a binary class prediction
    pub fn from_prediction(prediction: u8) -> Self {
        if prediction == 1 {
            RiskLabel::High
        } else {
            RiskLabel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Low => "Low Risk",
            RiskLabel::High => "High Risk",
            RiskLabel::Error => "Error",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single stroke risk prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub status: PredictionStatus,

    /// Binary class (1 = stroke risk), absent on error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<u8>,

    /// Class probabilities `[low, high]`
    pub probabilities: [f64; 2],

    pub risk_level: RiskLabel,

    /// Positive class probability as a percentage, e.g. `"37.5%"`
    pub probability_percent: String,

    /// Positive class probability (0.0 - 1.0)
    pub probability_raw: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionResult {
    /// Package a successful model call
    pub fn success(prediction: u8, probabilities: [f64; 2]) -> Self {
        Self {
            status: PredictionStatus::Success,
            prediction: Some(prediction),
            probabilities,
            risk_level: RiskLabel::from_prediction(prediction),
            probability_percent: format_percent(probabilities[1]),
            probability_raw: probabilities[1],
            error: None,
        }
    }

    /// Error result with zeroed probabilities
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: PredictionStatus::Error,
            prediction: None,
            probabilities: [0.0, 0.0],
            risk_level: RiskLabel::Error,
            probability_percent: format_percent(0.0),
            probability_raw: 0.0,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PredictionStatus::Success
    }
}

/// Format a probability as a one-decimal percentage
pub fn format_percent(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}
