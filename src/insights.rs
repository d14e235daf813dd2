//! Clinical interpretation of a patient record and a consensus risk

use crate::config::AssessmentConfig;
use crate::types::patient::{PatientRecord, SmokingStatus};
use serde::{Deserialize, Serialize};

/// Glucose level above which a patient is flagged, in mg/dL
const HIGH_GLUCOSE: f64 = 140.0;

/// Band of a consensus risk percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
}

impl RiskBand {
    /// Band for a risk percentage; thresholds are exclusive lower bounds.
    pub fn from_percent(risk_percent: f64, thresholds: &AssessmentConfig) -> Self {
        if risk_percent > thresholds.high_risk_percent {
            RiskBand::High
        } else if risk_percent > thresholds.moderate_risk_percent {
            RiskBand::Moderate
        } else {
            RiskBand::Low
        }
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            RiskBand::High => &[
                "Consult a cardiovascular specialist",
                "Consider lifestyle interventions",
                "Monitor blood pressure regularly",
            ],
            RiskBand::Moderate => &[
                "Annual stroke risk screening recommended",
                "Maintain healthy diet and exercise",
            ],
            RiskBand::Low => &[
                "Continue preventive health measures",
                "Regular check-ups recommended",
            ],
        }
    }
}

/// Risk and protective factors found in a patient record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalInsights {
    pub risk_factors: Vec<String>,
    pub protective_factors: Vec<String>,
}

impl ClinicalInsights {
    pub fn from_record(record: &PatientRecord) -> Self {
        let mut insights = Self::default();

        if record.age > 60.0 {
            insights
                .risk_factors
                .push(format!("Age ({} years)", record.age));
        }
        if record.hypertension {
            insights.risk_factors.push("Hypertension".to_string());
        }
        if record.avg_glucose_level > HIGH_GLUCOSE {
            insights.risk_factors.push(format!(
                "High glucose ({:.1} mg/dL)",
                record.avg_glucose_level
            ));
        }
        if matches!(
            record.smoking_status,
            SmokingStatus::FormerlySmoked | SmokingStatus::Smokes
        ) {
            insights.risk_factors.push("Smoking history".to_string());
        }

        if record.age < 40.0 {
            insights.protective_factors.push("Younger age".to_string());
        }
        if !record.hypertension {
            insights.protective_factors.push("No hypertension".to_string());
        }
        if record.smoking_status == SmokingStatus::NeverSmoked {
            insights.protective_factors.push("Never smoked".to_string());
        }

        insights
    }
}
