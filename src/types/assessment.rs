//! Assessment records emitted for each scored patient

use crate::models::comparison::ComparisonReport;
use crate::types::patient::PatientInput;
use crate::types::prediction::PredictionResult;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A patient's submitted attributes together with everything computed for them
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    /// Unique assessment identifier
    pub assessment_id: String,

    /// Caller-side patient identifier, copied from the input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,

    /// Name of the model behind `result`
    pub model: String,

    /// Assessment creation timestamp
    pub created_at: DateTime<Utc>,

    pub input: PatientInput,

    pub result: PredictionResult,

    /// Multi-model consensus, when comparison models are configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonReport>,
}

impl Assessment {
    /// Create a new assessment
    pub fn new(input: PatientInput, model: &str, result: PredictionResult) -> Self {
        Self {
            assessment_id: uuid::Uuid::new_v4().to_string(),
            patient_id: input.patient_id.clone(),
            model: model.to_string(),
            created_at: Utc::now(),
            input,
            result,
            comparison: None,
        }
    }

    /// Assessment for a record that could not be read at all
    pub fn unreadable(model: &str, error: impl std::fmt::Display) -> Self {
        Self::new(
            PatientInput::default(),
            model,
            PredictionResult::failure(format!("Invalid patient record: {}", error)),
        )
    }

    /// Attach a multi-model comparison
    pub fn with_comparison(mut self, comparison: ComparisonReport) -> Self {
        self.comparison = Some(comparison);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::patient::fixtures::reference_patient;
    use crate::types::prediction::RiskLabel;

    #[test]
    fn test_assessment_creation() {
        let result = PredictionResult::success(0, [0.8, 0.2]);
        let assessment = Assessment::new(reference_patient(), "Ensemble", result.clone());

        assert_eq!(assessment.patient_id.as_deref(), Some("PT-0001"));
        assert_eq!(assessment.result, result);
        assert!(uuid::Uuid::parse_str(&assessment.assessment_id).is_ok());
        assert!(assessment.comparison.is_none());
    }

    #[test]
    fn test_assessment_json_shape() {
        let assessment = Assessment::new(
            reference_patient(),
            "Ensemble",
            PredictionResult::failure("BMI must be between 10-50"),
        );
        let json = serde_json::to_value(&assessment).unwrap();

        assert_eq!(json["patient_id"], "PT-0001");
        assert_eq!(json["input"]["Residence_type"], "Urban");
        assert_eq!(json["result"]["risk_level"], "Error");
        assert_eq!(json["result"]["probability_percent"], "0.0%");
        assert!(json.get("comparison").is_none());
    }

    #[test]
    fn test_unreadable_record_gets_error_result() {
        let err = serde_json::from_str::<PatientInput>(r#"{"age": "sixty"}"#).unwrap_err();
        let assessment = Assessment::unreadable("Ensemble", &err);

        assert!(!assessment.result.is_success());
        assert_eq!(assessment.result.risk_level, RiskLabel::Error);
        assert!(assessment
            .result
            .error
            .as_deref()
            .unwrap()
            .starts_with("Invalid patient record: invalid type"));
        assert_eq!(assessment.patient_id, None);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Assessment::new(PatientInput::default(), "m", PredictionResult::failure("x"));
        let b = Assessment::new(PatientInput::default(), "m", PredictionResult::failure("x"));
        assert_ne!(a.assessment_id, b.assessment_id);
    }
}
