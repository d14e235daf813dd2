//! Offline model evaluation against a labelled validation set.

use crate::models::classifier::{argmax, Classifier};
use crate::models::inference::check_probabilities;
use crate::preprocessor::{FEATURE_COUNT, FEATURE_NAMES};
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Pre-encoded feature rows with their 0/1 stroke labels
#[derive(Debug, Clone, Default)]
pub struct ValidationSet {
    rows: Vec<[f32; FEATURE_COUNT]>,
    targets: Vec<u8>,
}

impl ValidationSet {
    pub fn new(rows: Vec<[f32; FEATURE_COUNT]>, targets: Vec<u8>) -> Result<Self> {
        if rows.len() != targets.len() {
            bail!("{} rows but {} targets", rows.len(), targets.len());
        }
        if let Some(bad) = targets.iter().find(|&&t| t > 1) {
            bail!("Target values must be 0 or 1, found {}", bad);
        }
        Ok(Self { rows, targets })
    }

    /// Load a CSV whose columns are the model features plus `target_column`.
    pub fn from_csv<P: AsRef<Path>>(path: P, target_column: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open validation data {}", path.display()))?;
        let set = Self::from_reader(file, target_column)
            .with_context(|| format!("Failed to load validation data {}", path.display()))?;

        info!(
            path = %path.display(),
            rows = set.len(),
            positives = set.positives(),
            "Validation data loaded"
        );
        Ok(set)
    }

    /// Parse CSV data. Feature columns are matched by name, so their
    /// order in the file does not matter.
    pub fn from_reader<R: Read>(reader: R, target_column: &str) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h.trim() == name);

        let target_index = column(target_column)
            .ok_or_else(|| anyhow!("Target column '{}' not found", target_column))?;

        let missing: Vec<&str> = FEATURE_NAMES
            .iter()
            .copied()
            .filter(|name| column(name).is_none())
            .collect();
        if !missing.is_empty() {
            bail!("Validation data is missing feature columns: {}", missing.join(", "));
        }
        let feature_indices: Vec<usize> = FEATURE_NAMES.iter().filter_map(|name| column(name)).collect();

        let mut rows = Vec::new();
        let mut targets = Vec::new();

        for (line, record) in csv_reader.records().enumerate() {
            let record = record.with_context(|| format!("Malformed row {}", line + 1))?;

            let mut row = [0.0_f32; FEATURE_COUNT];
            for (slot, (&index, name)) in row.iter_mut().zip(feature_indices.iter().zip(FEATURE_NAMES)) {
                let raw = record.get(index).unwrap_or_default().trim();
                *slot = raw
                    .parse()
                    .with_context(|| format!("Row {}: invalid value '{}' for {}", line + 1, raw, name))?;
            }

            let raw_target = record.get(target_index).unwrap_or_default().trim();
            let target: f64 = raw_target
                .parse()
                .with_context(|| format!("Row {}: invalid target '{}'", line + 1, raw_target))?;
            let target = match target {
                t if t == 0.0 => 0,
                t if t == 1.0 => 1,
                _ => bail!("Row {}: target must be 0 or 1, found {}", line + 1, raw_target),
            };

            rows.push(row);
            targets.push(target);
        }

        Self::new(rows, targets)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of stroke cases
    pub fn positives(&self) -> usize {
        self.targets.iter().filter(|&&t| t == 1).count()
    }

    pub fn targets(&self) -> &[u8] {
        &self.targets
    }
}

/// 2x2 confusion matrix, rows = actual, columns = predicted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(targets: &[u8], predictions: &[u8]) -> Self {
        let mut matrix = Self::default();
        for (&actual, &predicted) in targets.iter().zip(predictions) {
            match (actual, predicted) {
                (0, 0) => matrix.true_negatives += 1,
                (0, _) => matrix.false_positives += 1,
                (_, 0) => matrix.false_negatives += 1,
                _ => matrix.true_positives += 1,
            }
        }
        matrix
    }

    /// `[[tn, fp], [fn, tp]]`
    pub fn as_array(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negatives, self.false_positives],
            [self.false_negatives, self.true_positives],
        ]
    }

    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_negatives + self.true_positives, self.total())
    }

    /// Precision, recall and F1 for the positive class
    pub fn positive_class(&self) -> ClassMetrics {
        ClassMetrics::new(
            self.true_positives,
            self.false_positives,
            self.false_negatives,
        )
    }

    /// Precision, recall and F1 for the negative class
    pub fn negative_class(&self) -> ClassMetrics {
        ClassMetrics::new(
            self.true_negatives,
            self.false_negatives,
            self.false_positives,
        )
    }
}

/// Division that reports 0 when the denominator is empty
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Per-class precision, recall, F1 and support
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn new(hits: usize, false_alarms: usize, misses: usize) -> Self {
        let precision = ratio(hits, hits + false_alarms);
        let recall = ratio(hits, hits + misses);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            precision,
            recall,
            f1_score,
            support: hits + misses,
        }
    }
}

/// Classification report in the usual per-class layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub low_risk: ClassMetrics,
    pub high_risk: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_matrix(matrix: &ConfusionMatrix) -> Self {
        let low = matrix.negative_class();
        let high = matrix.positive_class();
        let support = low.support + high.support;

        let macro_avg = ClassMetrics {
            precision: (low.precision + high.precision) / 2.0,
            recall: (low.recall + high.recall) / 2.0,
            f1_score: (low.f1_score + high.f1_score) / 2.0,
            support,
        };

        let weight = |a: f64, b: f64| {
            if support == 0 {
                0.0
            } else {
                (a * low.support as f64 + b * high.support as f64) / support as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weight(low.precision, high.precision),
            recall: weight(low.recall, high.recall),
            f1_score: weight(low.f1_score, high.f1_score),
            support,
        };

        Self {
            low_risk: low,
            high_risk: high,
            accuracy: matrix.accuracy(),
            macro_avg,
            weighted_avg,
        }
    }
}

/// One point on the ROC curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
    /// Scores at or above this are predicted positive
    pub threshold: f64,
}

/// ROC curve over distinct score thresholds, highest threshold first.
///
/// Returns an empty curve when only one class is present.
pub fn roc_curve(scores: &[f64], targets: &[u8]) -> Vec<RocPoint> {
    let positives = targets.iter().filter(|&&t| t == 1).count();
    let negatives = targets.len() - positives;
    if positives == 0 || negatives == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut curve = vec![RocPoint {
        false_positive_rate: 0.0,
        true_positive_rate: 0.0,
        threshold: f64::INFINITY,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);

    for (rank, &index) in order.iter().enumerate() {
        if targets[index] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }

        // Tied scores share one threshold
        let last_of_tie = order
            .get(rank + 1)
            .map_or(true, |&next| scores[next] != scores[index]);
        if last_of_tie {
            curve.push(RocPoint {
                false_positive_rate: fp as f64 / negatives as f64,
                true_positive_rate: tp as f64 / positives as f64,
                threshold: scores[index],
            });
        }
    }

    curve
}

/// Area under the ROC curve by the trapezoidal rule
pub fn roc_auc(curve: &[RocPoint]) -> Option<f64> {
    if curve.len() < 2 {
        return None;
    }

    Some(
        curve
            .windows(2)
            .map(|pair| {
                let width = pair[1].false_positive_rate - pair[0].false_positive_rate;
                width * (pair[1].true_positive_rate + pair[0].true_positive_rate) / 2.0
            })
            .sum(),
    )
}

/// All metrics for one model on the validation set
#[derive(Debug, Clone, Serialize)]
pub struct ModelEvaluation {
    pub model: String,
    pub accuracy: f64,
    /// Absent when the validation set holds a single class
    pub roc_auc: Option<f64>,
    pub f1_score: f64,
    pub precision: f64,
    pub recall: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub classification_report: ClassificationReport,
    pub roc_curve: Vec<RocPoint>,
}

/// Metric used to compare models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Accuracy,
    RocAuc,
    F1Score,
    Precision,
    Recall,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Accuracy,
        Metric::RocAuc,
        Metric::F1Score,
        Metric::Precision,
        Metric::Recall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::RocAuc => "roc_auc",
            Metric::F1Score => "f1_score",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
        }
    }

    pub fn value(&self, evaluation: &ModelEvaluation) -> Option<f64> {
        match self {
            Metric::Accuracy => Some(evaluation.accuracy),
            Metric::RocAuc => evaluation.roc_auc,
            Metric::F1Score => Some(evaluation.f1_score),
            Metric::Precision => Some(evaluation.precision),
            Metric::Recall => Some(evaluation.recall),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Metric::ALL
            .iter()
            .copied()
            .find(|metric| metric.as_str() == s)
            .ok_or_else(|| anyhow!("Unknown metric '{}'", s))
    }
}

/// Score every row with `model` and compute its metrics.
pub fn evaluate(model: &dyn Classifier, data: &ValidationSet) -> Result<ModelEvaluation> {
    if data.is_empty() {
        bail!("Validation set is empty");
    }

    let mut scores = Vec::with_capacity(data.len());
    let mut predictions = Vec::with_capacity(data.len());
    for (row_index, row) in data.rows.iter().enumerate() {
        let probabilities = model
            .predict_proba(row)
            .and_then(|probabilities| check_probabilities(&probabilities).map(|_| probabilities))
            .with_context(|| format!("{} failed on row {}", model.name(), row_index + 1))?;
        scores.push(probabilities[1]);
        predictions.push(argmax(&probabilities));
    }

    let confusion_matrix = ConfusionMatrix::from_predictions(&data.targets, &predictions);
    let positive = confusion_matrix.positive_class();
    let curve = roc_curve(&scores, &data.targets);
    let auc = roc_auc(&curve);
    if auc.is_none() {
        warn!(model = %model.name(), "ROC AUC undefined: validation set holds a single class");
    }

    Ok(ModelEvaluation {
        model: model.name().to_string(),
        accuracy: confusion_matrix.accuracy(),
        roc_auc: auc,
        f1_score: positive.f1_score,
        precision: positive.precision,
        recall: positive.recall,
        classification_report: ClassificationReport::from_matrix(&confusion_matrix),
        confusion_matrix,
        roc_curve: curve,
    })
}

/// Evaluate each model; failures are logged and left out.
pub fn evaluate_all(models: &[Arc<dyn Classifier>], data: &ValidationSet) -> Vec<ModelEvaluation> {
    models
        .iter()
        .filter_map(|model| match evaluate(model.as_ref(), data) {
            Ok(evaluation) => Some(evaluation),
            Err(e) => {
                error!(model = %model.name(), error = %format!("{:#}", e), "Evaluation failed");
                None
            }
        })
        .collect()
}

/// `(model, value)` pairs sorted best first; models without a value are left out.
pub fn rank_by(evaluations: &[ModelEvaluation], metric: Metric) -> Vec<(&str, f64)> {
    let mut ranked: Vec<(&str, f64)> = evaluations
        .iter()
        .filter_map(|e| metric.value(e).map(|v| (e.model.as_str(), v)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::testing::{BrokenClassifier, ColumnClassifier, FixedClassifier};

    fn row(first: f32) -> [f32; FEATURE_COUNT] {
        let mut row = [0.0; FEATURE_COUNT];
        row[0] = first;
        row
    }

    fn header() -> String {
        FEATURE_NAMES.join(",")
    }

    #[test]
    fn test_perfect_separation() {
        let data = ValidationSet::new(
            vec![row(-2.0), row(-1.0), row(1.0), row(2.0)],
            vec![0, 0, 1, 1],
        )
        .unwrap();

        let evaluation = evaluate(&ColumnClassifier { column: 0 }, &data).unwrap();

        assert_eq!(evaluation.accuracy, 1.0);
        assert_eq!(evaluation.roc_auc, Some(1.0));
        assert_eq!(evaluation.confusion_matrix.as_array(), [[2, 0], [0, 2]]);
        assert_eq!(evaluation.classification_report.macro_avg.f1_score, 1.0);
    }

    #[test]
    fn test_constant_classifier_metrics() {
        let data = ValidationSet::new(
            vec![row(0.0); 5],
            vec![0, 1, 1, 0, 1],
        )
        .unwrap();

        let evaluation = evaluate(&FixedClassifier::new("always high", 0.8), &data).unwrap();

        assert_eq!(evaluation.confusion_matrix.as_array(), [[0, 2], [0, 3]]);
        assert!((evaluation.accuracy - 0.6).abs() < 1e-12);
        assert!((evaluation.precision - 0.6).abs() < 1e-12);
        assert_eq!(evaluation.recall, 1.0);
        assert!((evaluation.f1_score - 0.75).abs() < 1e-12);
        // all scores tie, so the curve is the diagonal
        assert_eq!(evaluation.roc_auc, Some(0.5));

        let report = &evaluation.classification_report;
        assert_eq!(report.low_risk.precision, 0.0);
        assert_eq!(report.low_risk.support, 2);
        assert_eq!(report.high_risk.support, 3);
        assert!((report.weighted_avg.f1_score - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_with_misordered_pair() {
        let curve = roc_curve(&[0.1, 0.4, 0.35, 0.8], &[0, 0, 1, 1]);

        assert_eq!(curve.first().unwrap().threshold, f64::INFINITY);
        assert_eq!(curve.last().unwrap().false_positive_rate, 1.0);
        assert_eq!(curve.last().unwrap().true_positive_rate, 1.0);
        assert!((roc_auc(&curve).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_undefined_for_single_class() {
        assert!(roc_curve(&[0.2, 0.9], &[1, 1]).is_empty());
        assert_eq!(roc_auc(&[]), None);
    }

    #[test]
    fn test_csv_loading_reorders_columns() {
        let mut columns: Vec<&str> = FEATURE_NAMES.to_vec();
        columns.reverse();
        let mut csv = format!("stroke,{}\n", columns.join(","));
        // age is the last column after reversing
        csv.push_str(&format!("1,{}1.5\n", "0,".repeat(FEATURE_COUNT - 1)));
        csv.push_str(&format!("0.0,{}-0.5\n", "0,".repeat(FEATURE_COUNT - 1)));

        let data = ValidationSet::from_reader(csv.as_bytes(), "stroke").unwrap();

        assert_eq!(data.len(), 2);
        assert_eq!(data.targets(), &[1, 0]);
        assert_eq!(data.positives(), 1);
        assert_eq!(data.rows[0][0], 1.5);
        assert_eq!(data.rows[1][0], -0.5);
    }

    #[test]
    fn test_csv_missing_columns() {
        let csv = "age,bmi,stroke\n0.1,0.2,1\n";
        let err = ValidationSet::from_reader(csv.as_bytes(), "stroke").unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("Validation data is missing feature columns: hypertension"));
        assert!(!message.contains("bmi,"));
    }

    #[test]
    fn test_csv_missing_target() {
        let csv = format!("{}\n", header());
        let err = ValidationSet::from_reader(csv.as_bytes(), "stroke").unwrap_err();
        assert_eq!(err.to_string(), "Target column 'stroke' not found");
    }

    #[test]
    fn test_csv_rejects_bad_target() {
        let csv = format!("{},stroke\n{}2\n", header(), "0,".repeat(FEATURE_COUNT));
        assert!(ValidationSet::from_reader(csv.as_bytes(), "stroke").is_err());
    }

    #[test]
    fn test_csv_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validation.csv");
        let csv = format!("{},stroke\n{}1\n", header(), "0.5,".repeat(FEATURE_COUNT));
        std::fs::write(&path, csv).unwrap();

        let data = ValidationSet::from_csv(&path, "stroke").unwrap();
        assert_eq!(data.len(), 1);
        assert!(data.rows[0].iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_evaluate_all_skips_failures() {
        let data = ValidationSet::new(vec![row(-1.0), row(1.0)], vec![0, 1]).unwrap();
        let models: Vec<Arc<dyn Classifier>> = vec![
            Arc::new(ColumnClassifier { column: 0 }),
            Arc::new(BrokenClassifier),
            Arc::new(FixedClassifier::new("XGBoost", 0.9)),
        ];

        let evaluations = evaluate_all(&models, &data);
        assert_eq!(evaluations.len(), 2);

        let ranked = rank_by(&evaluations, Metric::Accuracy);
        assert_eq!(ranked, vec![("column", 1.0), ("XGBoost", 0.5)]);
    }

    #[test]
    fn test_non_finite_scores_fail_evaluation() {
        let data = ValidationSet::new(vec![row(-1.0), row(1.0)], vec![0, 1]).unwrap();
        let mut model = FixedClassifier::new("Extra Trees", 0.5);
        model.probabilities = [f64::NAN, f64::NAN];

        let err = evaluate(&model, &data).unwrap_err();
        assert_eq!(err.to_string(), "Extra Trees failed on row 1");
        assert!(format!("{:#}", err).contains("invalid probabilities"));

        let models: Vec<Arc<dyn Classifier>> = vec![Arc::new(model)];
        assert!(evaluate_all(&models, &data).is_empty());
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("roc_auc".parse::<Metric>().unwrap(), Metric::RocAuc);
        assert_eq!(Metric::F1Score.to_string(), "f1_score");
        assert!("auc".parse::<Metric>().is_err());
    }

    #[test]
    fn test_empty_set_is_an_error() {
        let data = ValidationSet::default();
        assert!(evaluate(&FixedClassifier::new("x", 0.5), &data).is_err());
    }
}
