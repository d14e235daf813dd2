//! Side-by-side risk comparison across several models

use crate::config::AssessmentConfig;
use crate::insights::{ClinicalInsights, RiskBand};
use crate::models::classifier::Classifier;
use crate::models::inference::{check_probabilities, rank_importances, FeatureImportance};
use crate::preprocessor::FeaturePreprocessor;
use crate::types::patient::PatientInput;
use anyhow::{bail, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// One model's view of a patient
#[derive(Debug, Clone, Serialize)]
pub struct ModelVerdict {
    pub model: String,
    pub low_risk: f64,
    pub high_risk: f64,
    /// All features ranked by importance, when the model exposes them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_importances: Option<Vec<FeatureImportance>>,
}

/// A model that could not score the patient
#[derive(Debug, Clone, Serialize)]
pub struct ModelFailure {
    pub model: String,
    pub error: String,
}

/// Consensus of all comparison models for one patient
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub verdicts: Vec<ModelVerdict>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ModelFailure>,
    /// Mean positive class probability across models, as a percentage
    pub average_risk_percent: f64,
    pub band: RiskBand,
    pub recommendations: Vec<String>,
    /// 1 - std dev of model scores (higher = models agree more)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement: Option<f64>,
    pub insights: ClinicalInsights,
}

/// Runs every comparison model on the same preprocessed patient.
pub struct ModelComparison {
    preprocessor: FeaturePreprocessor,
    models: Vec<Arc<dyn Classifier>>,
    thresholds: AssessmentConfig,
}

impl ModelComparison {
    pub fn new(models: Vec<Arc<dyn Classifier>>, thresholds: AssessmentConfig) -> Self {
        Self {
            preprocessor: FeaturePreprocessor::new(),
            models,
            thresholds,
        }
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Score the patient with every model.
    ///
    /// Individual model failures are logged and reported; the comparison
    /// only fails on invalid input or when no model produced a score.
    pub fn compare(&self, input: &PatientInput) -> Result<ComparisonReport> {
        let record = input.validate()?;
        let features = self.preprocessor.preprocess(&record);

        let mut verdicts = Vec::with_capacity(self.models.len());
        let mut failures = Vec::new();

        for model in &self.models {
            let scored = model
                .predict_proba(features.as_slice())
                .and_then(|probabilities| check_probabilities(&probabilities).map(|_| probabilities));
            match scored {
                Ok([low_risk, high_risk]) => verdicts.push(ModelVerdict {
                    model: model.name().to_string(),
                    low_risk,
                    high_risk,
                    feature_importances: model.feature_importances().map(rank_importances),
                }),
                Err(e) => {
                    error!(model = %model.name(), error = %e, "Model inference failed");
                    failures.push(ModelFailure {
                        model: model.name().to_string(),
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        if verdicts.is_empty() {
            bail!("All models failed to predict");
        }

        let scores: Vec<f64> = verdicts.iter().map(|v| v.high_risk).collect();
        let average_risk_percent = mean(&scores) * 100.0;
        let band = RiskBand::from_percent(average_risk_percent, &self.thresholds);

        debug!(
            models = verdicts.len(),
            failed = failures.len(),
            average_risk_percent = average_risk_percent,
            band = ?band,
            "Model comparison complete"
        );

        Ok(ComparisonReport {
            verdicts,
            failures,
            average_risk_percent,
            band,
            recommendations: band.recommendations().iter().map(|r| r.to_string()).collect(),
            agreement: agreement(&scores),
            insights: ClinicalInsights::from_record(&record),
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Agreement = 1 - population std dev of scores, capped at [0, 1].
fn agreement(scores: &[f64]) -> Option<f64> {
    if scores.len() < 2 {
        return None;
    }

    let mean = mean(scores);
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
    Some(1.0 - variance.sqrt().min(1.0))
}
