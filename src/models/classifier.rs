//! Classifier abstraction shared by every loaded model

use anyhow::Result;

/// A fitted binary classifier over the stroke feature vector.
pub trait Classifier: Send + Sync {
    /// Display name of the model
    fn name(&self) -> &str;

    /// Class probabilities `[low, high]` for one feature row.
    fn predict_proba(&self, features: &[f32]) -> Result<[f64; 2]>;

    /// Binary class prediction: the more probable class, ties go to class 0.
    fn predict(&self, features: &[f32]) -> Result<u8> {
        let probabilities = self.predict_proba(features)?;
        Ok(argmax(&probabilities))
    }

    /// Per-feature importances, in feature order, if the model exposes them.
    fn feature_importances(&self) -> Option<&[f64]> {
        None
    }
}

/// Index of the larger class probability (ties resolve to class 0)
pub fn argmax(probabilities: &[f64; 2]) -> u8 {
    if probabilities[1] > probabilities[0] {
        1
    } else {
        0
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Classifier doubles for unit tests

    use super::Classifier;
    use anyhow::{bail, Result};

    /// Returns the same probabilities for every row.
    pub struct FixedClassifier {
        pub name: String,
        pub probabilities: [f64; 2],
        pub importances: Option<Vec<f64>>,
    }

    impl FixedClassifier {
        pub fn new(name: &str, high_risk: f64) -> Self {
            Self {
                name: name.to_string(),
                probabilities: [1.0 - high_risk, high_risk],
                importances: None,
            }
        }

        pub fn with_importances(mut self, importances: Vec<f64>) -> Self {
            self.importances = Some(importances);
            self
        }
    }

    impl Classifier for FixedClassifier {
        fn name(&self) -> &str {
            &self.name
        }

        fn predict_proba(&self, _features: &[f32]) -> Result<[f64; 2]> {
            Ok(self.probabilities)
        }

        fn feature_importances(&self) -> Option<&[f64]> {
            self.importances.as_deref()
        }
    }

    /// Stands in for a corrupted model: every call fails.
    pub struct BrokenClassifier;

    impl Classifier for BrokenClassifier {
        fn name(&self) -> &str {
            "broken"
        }

        fn predict_proba(&self, _features: &[f32]) -> Result<[f64; 2]> {
            bail!("model state is corrupted")
        }
    }

    /// Scores a row by one feature column passed through a logistic curve.
    pub struct ColumnClassifier {
        pub column: usize,
    }

    impl Classifier for ColumnClassifier {
        fn name(&self) -> &str {
            "column"
        }

        fn predict_proba(&self, features: &[f32]) -> Result<[f64; 2]> {
            let z = features[self.column] as f64;
            let high = 1.0 / (1.0 + (-z).exp());
            Ok([1.0 - high, high])
        }
    }
}
