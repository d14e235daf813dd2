//! Single-patient stroke risk inference

use crate::models::classifier::{argmax, Classifier};
use crate::preprocessor::{FeaturePreprocessor, FEATURE_NAMES};
use crate::types::patient::PatientInput;
use crate::types::prediction::PredictionResult;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Importance of one input feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Pair importances with feature names, most important first
pub fn rank_importances(importances: &[f64]) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = FEATURE_NAMES
        .iter()
        .zip(importances)
        .map(|(feature, &importance)| FeatureImportance {
            feature: feature.to_string(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}

/// Outcome of re-running a prediction with modified attributes
#[derive(Debug, Clone, Serialize)]
pub struct WhatIfOutcome {
    /// Positive class probability before the change
    pub original_risk: f64,
    /// Positive class probability after the change
    pub new_risk: f64,
    /// `new_risk - original_risk`
    pub risk_change: f64,
    /// Risk rose by more than the configured threshold
    pub significant_increase: bool,
    pub details: PredictionResult,
}

/// Preprocesses patient input and runs the primary classifier on it.
pub struct StrokePredictor {
    preprocessor: FeaturePreprocessor,
    model: Arc<dyn Classifier>,
    /// What-if increases above this many percentage points are significant
    significant_change_percent: f64,
}

impl StrokePredictor {
    pub fn new(model: Arc<dyn Classifier>) -> Self {
        Self {
            preprocessor: FeaturePreprocessor::new(),
            model,
            significant_change_percent: 5.0,
        }
    }

    pub fn with_significant_change(mut self, percent: f64) -> Self {
        self.significant_change_percent = percent;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn preprocessor(&self) -> &FeaturePreprocessor {
        &self.preprocessor
    }

    /// Predict stroke risk for one patient.
    ///
    /// Never fails: validation and model errors come back as an error
    /// result, so callers must check `status`.
    pub fn predict(&self, input: &PatientInput) -> PredictionResult {
        match self.try_predict(input) {
            Ok(result) => {
                debug!(
                    model = %self.model.name(),
                    patient_id = ?input.patient_id,
                    risk = result.probability_raw,
                    risk_level = %result.risk_level,
                    "Prediction complete"
                );
                result
            }
            Err(e) => {
                warn!(
                    model = %self.model.name(),
                    patient_id = ?input.patient_id,
                    error = %format!("{:#}", e),
                    "Prediction failed"
                );
                PredictionResult::failure(format!("{:#}", e))
            }
        }
    }

    fn try_predict(&self, input: &PatientInput) -> Result<PredictionResult> {
        let features = self.preprocessor.prepare(input)?;

        let probabilities = self
            .model
            .predict_proba(features.as_slice())
            .with_context(|| format!("Model {} failed", self.model.name()))?;
        check_probabilities(&probabilities)?;

        Ok(PredictionResult::success(argmax(&probabilities), probabilities))
    }

    /// Re-run the prediction with `changes` overlaid on `base`.
    pub fn what_if(
        &self,
        base: &PatientInput,
        base_result: &PredictionResult,
        changes: &PatientInput,
    ) -> Result<WhatIfOutcome> {
        let modified = base.merged_with(changes);
        let details = self.predict(&modified);
        if !details.is_success() {
            return Err(anyhow!(details
                .error
                .clone()
                .unwrap_or_else(|| "Prediction failed".to_string())));
        }

        let risk_change = details.probability_raw - base_result.probability_raw;

        Ok(WhatIfOutcome {
            original_risk: base_result.probability_raw,
            new_risk: details.probability_raw,
            risk_change,
            significant_increase: risk_change * 100.0 > self.significant_change_percent,
            details,
        })
    }

    /// The model's `top_n` most important features.
    pub fn feature_importance(&self, top_n: usize) -> Result<Vec<FeatureImportance>> {
        let importances = self
            .model
            .feature_importances()
            .ok_or_else(|| anyhow!("Model doesn't support feature importance"))?;

        let mut ranked = rank_importances(importances);
        ranked.truncate(top_n);
        Ok(ranked)
    }
}

/// Reject probabilities that are non-finite or outside `[0, 1]`.
pub(crate) fn check_probabilities(probabilities: &[f64; 2]) -> Result<()> {
    if probabilities
        .iter()
        .any(|p| !p.is_finite() || !(0.0..=1.0).contains(p))
    {
        bail!("Model returned invalid probabilities {:?}", probabilities);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::testing::{BrokenClassifier, ColumnClassifier, FixedClassifier};
    use crate::types::patient::fixtures::reference_patient;
    use crate::types::prediction::{PredictionStatus, RiskLabel};

    #[test]
    fn test_successful_prediction() {
        let predictor = StrokePredictor::new(Arc::new(FixedClassifier::new("ensemble", 0.75)));
        let result = predictor.predict(&reference_patient());

        assert_eq!(result.status, PredictionStatus::Success);
        assert_eq!(result.prediction, Some(1));
        assert_eq!(result.probabilities, [0.25, 0.75]);
        assert_eq!(result.risk_level, RiskLabel::High);
        assert_eq!(result.probability_percent, "75.0%");
        assert_eq!(result.probability_raw, 0.75);
    }

    #[test]
    fn test_low_risk_prediction() {
        let predictor = StrokePredictor::new(Arc::new(FixedClassifier::new("ensemble", 0.125)));
        let result = predictor.predict(&reference_patient());

        assert_eq!(result.prediction, Some(0));
        assert_eq!(result.risk_level, RiskLabel::Low);
        assert_eq!(result.probability_percent, "12.5%");
    }

    #[test]
    fn test_broken_model_returns_error_result() {
        let predictor = StrokePredictor::new(Arc::new(BrokenClassifier));
        let result = predictor.predict(&reference_patient());

        assert_eq!(result.status, PredictionStatus::Error);
        assert_eq!(result.probabilities, [0.0, 0.0]);
        assert_eq!(result.risk_level, RiskLabel::Error);
        assert_eq!(result.probability_raw, 0.0);
        assert!(result.error.unwrap().contains("model state is corrupted"));
    }

    #[test]
    fn test_validation_failure_returns_error_result() {
        let predictor = StrokePredictor::new(Arc::new(FixedClassifier::new("ensemble", 0.75)));
        let input = PatientInput {
            age: Some(150.0),
            gender: Some("X".to_string()),
            ..reference_patient()
        };

        let result = predictor.predict(&input);
        assert!(!result.is_success());
        assert_eq!(
            result.error.as_deref(),
            Some("Age must be between 0-120 | Gender must be one of: Male, Female, Other")
        );
    }

    #[test]
    fn test_invalid_probabilities_are_rejected() {
        let mut model = FixedClassifier::new("ensemble", 0.5);
        model.probabilities = [f64::NAN, 0.5];
        let predictor = StrokePredictor::new(Arc::new(model));

        let result = predictor.predict(&reference_patient());
        assert_eq!(result.risk_level, RiskLabel::Error);
    }

    #[test]
    fn test_what_if_reports_risk_change() {
        // Risk follows the standardized age column
        let predictor = StrokePredictor::new(Arc::new(ColumnClassifier { column: 0 }));
        let base = reference_patient();
        let base_result = predictor.predict(&base);

        let older = PatientInput {
            age: Some(95.0),
            ..Default::default()
        };
        let outcome = predictor.what_if(&base, &base_result, &older).unwrap();

        assert!(outcome.new_risk > outcome.original_risk);
        assert!((outcome.risk_change - (outcome.new_risk - outcome.original_risk)).abs() < 1e-12);
        assert!(outcome.significant_increase);

        let younger = PatientInput {
            age: Some(20.0),
            ..Default::default()
        };
        let outcome = predictor.what_if(&base, &base_result, &younger).unwrap();
        assert!(outcome.risk_change < 0.0);
        assert!(!outcome.significant_increase);
    }

    #[test]
    fn test_what_if_propagates_failure() {
        let predictor = StrokePredictor::new(Arc::new(FixedClassifier::new("ensemble", 0.3)));
        let base = reference_patient();
        let base_result = predictor.predict(&base);

        let changes = PatientInput {
            bmi: Some(80.0),
            ..Default::default()
        };
        let err = predictor.what_if(&base, &base_result, &changes).unwrap_err();
        assert_eq!(err.to_string(), "BMI must be between 10-50");
    }

    #[test]
    fn test_feature_importance_ranking() {
        let mut importances = vec![0.01; 21];
        importances[0] = 0.4;
        importances[3] = 0.3;
        importances[19] = 0.2;
        let model = FixedClassifier::new("rf", 0.2).with_importances(importances);
        let predictor = StrokePredictor::new(Arc::new(model));

        let top = predictor.feature_importance(3).unwrap();
        let names: Vec<&str> = top.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(names, vec!["age", "avg_glucose_level", "age_group_61-75"]);
    }

    #[test]
    fn test_feature_importance_unsupported() {
        let predictor = StrokePredictor::new(Arc::new(FixedClassifier::new("ensemble", 0.2)));
        let err = predictor.feature_importance(10).unwrap_err();
        assert_eq!(err.to_string(), "Model doesn't support feature importance");
    }
}
