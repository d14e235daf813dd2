//! ONNX model loader

use crate::config::{ModelSpec, ModelsConfig};
use crate::models::classifier::Classifier;
use crate::preprocessor::FEATURE_COUNT;
use anyhow::{anyhow, bail, Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// A fitted classifier exported to ONNX.
pub struct OnnxClassifier {
    /// Model name
    name: String,
    /// ONNX Runtime session; running it needs exclusive access
    session: Mutex<Session>,
    /// Input name for the model
    input_name: String,
    /// Output name for probabilities
    output_name: String,
    /// Feature importances from the sidecar file, if any
    importances: Option<Vec<f64>>,
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_proba(&self, features: &[f32]) -> Result<[f64; 2]> {
        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_vec())).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        extract_probabilities(&outputs, &self.output_name, &self.name)
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.importances.as_deref()
    }
}

/// Extract class probabilities from model output.
///
/// Handles tensor outputs (random forest, XGBoost, extra trees) and
/// seq(map) outputs (sklearn ensembles exported with zipmap).
fn extract_probabilities(
    outputs: &SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> Result<[f64; 2]> {
    if let Some(output) = outputs.get(output_name) {
        if let Some(probabilities) = probabilities_from_value(&output, model_name) {
            return Ok(probabilities);
        }
    }

    // Fallback: any non-label output that yields probabilities
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Some(probabilities) = probabilities_from_value(&output, model_name) {
            debug!(model = %model_name, output = %name, "Extracted probabilities (fallback)");
            return Ok(probabilities);
        }
    }

    bail!("Model {} produced no probability output", model_name)
}

fn probabilities_from_value(output: &DynValue, model_name: &str) -> Option<[f64; 2]> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        let probabilities = probabilities_from_tensor(&dims, data);
        debug!(model = %model_name, probabilities = ?probabilities, "Extracted from tensor");
        return probabilities;
    }

    if DynSequenceValueType::can_downcast(&output.dtype()) {
        match probabilities_from_sequence_map(output) {
            Ok(probabilities) => {
                debug!(model = %model_name, probabilities = ?probabilities, "Extracted from seq(map)");
                return Some(probabilities);
            }
            Err(e) => debug!(model = %model_name, error = %e, "seq(map) extraction failed"),
        }
    }

    None
}

/// Read `[low, high]` from a probability tensor of shape `[1, 2]`,
/// `[1, 1]`, `[2]` or `[1]`. Single-column outputs hold the positive class.
pub(crate) fn probabilities_from_tensor(dims: &[i64], data: &[f32]) -> Option<[f64; 2]> {
    let classes = match dims {
        [1, classes] | [classes] => *classes,
        _ => return None,
    };

    match (classes, data) {
        (2, [low, high, ..]) => Some([*low as f64, *high as f64]),
        (1, [high, ..]) => Some([1.0 - *high as f64, *high as f64]),
        _ => None,
    }
}

/// Read probabilities from a seq(map(int64, float)) output.
fn probabilities_from_sequence_map(output: &DynValue) -> Result<[f64; 2]> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow!("Failed to downcast to sequence: {}", e))?;

    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    // batch size is always 1
    let map_value = maps.first().ok_or_else(|| anyhow!("Empty sequence"))?;
    let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;

    let class = |id: i64| {
        kv_pairs
            .iter()
            .find(|(class_id, _)| *class_id == id)
            .map(|(_, prob)| *prob as f64)
    };

    match (class(0), class(1)) {
        (Some(low), Some(high)) => Ok([low, high]),
        (None, Some(high)) => Ok([1.0 - high, high]),
        (Some(low), None) => Ok([low, 1.0 - low]),
        (None, None) => bail!("No probability found in map"),
    }
}

/// Models loaded from the configured directory
pub struct LoadedModels {
    /// Model behind single-patient predictions
    pub primary: Arc<dyn Classifier>,
    /// Models compared side by side
    pub comparison: Vec<Arc<dyn Classifier>>,
}

impl LoadedModels {
    /// Primary model followed by the comparison models
    pub fn all(&self) -> Vec<Arc<dyn Classifier>> {
        std::iter::once(self.primary.clone())
            .chain(self.comparison.iter().cloned())
            .collect()
    }

    pub fn model_names(&self) -> Vec<String> {
        self.all().iter().map(|m| m.name().to_string()).collect()
    }
}

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Result<Self> {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load a single ONNX model from file.
    ///
    /// A missing or malformed file is an error; callers treat it as fatal.
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<OnnxClassifier> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("Model file not found at {}", path.display());
        }

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        let importances = load_importances(&importances_path(path))?;

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            has_importances = importances.is_some(),
            "Model loaded successfully"
        );

        Ok(OnnxClassifier {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            output_name,
            importances,
        })
    }

    /// Load a model described in configuration, relative to `models_dir`
    pub fn load_spec<P: AsRef<Path>>(&self, models_dir: P, spec: &ModelSpec) -> Result<OnnxClassifier> {
        self.load_model(models_dir.as_ref().join(&spec.file), &spec.name)
    }

    /// Load the primary and comparison models. Any failure aborts loading.
    pub fn load_configured(&self, config: &ModelsConfig) -> Result<LoadedModels> {
        let models_dir = Path::new(&config.models_dir);

        let primary: Arc<dyn Classifier> = Arc::new(self.load_spec(models_dir, &config.primary)?);
        let comparison = config
            .comparison
            .iter()
            .map(|spec| {
                self.load_spec(models_dir, spec)
                    .map(|model| Arc::new(model) as Arc<dyn Classifier>)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            count = comparison.len() + 1,
            "Loaded {} models from {}",
            comparison.len() + 1,
            models_dir.display()
        );

        Ok(LoadedModels {
            primary,
            comparison,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}

/// Sidecar path holding a model's feature importances
pub fn importances_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("importances.json")
}

/// Read a feature importance sidecar; absent files mean no importances.
pub fn load_importances(path: &Path) -> Result<Option<Vec<f64>>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let importances: Vec<f64> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if importances.len() != FEATURE_COUNT {
        bail!(
            "{} holds {} importances, expected {}",
            path.display(),
            importances.len(),
            FEATURE_COUNT
        );
    }

    Ok(Some(importances))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_two_class_tensor() {
        assert_eq!(probabilities_from_tensor(&[1, 2], &[0.25, 0.75]), Some([0.25, 0.75]));
        assert_eq!(probabilities_from_tensor(&[2], &[0.5, 0.5]), Some([0.5, 0.5]));
    }

    #[test]
    fn test_single_column_tensor_is_positive_class() {
        assert_eq!(probabilities_from_tensor(&[1, 1], &[0.25]), Some([0.75, 0.25]));
    }

    #[test]
    fn test_unsupported_tensor_shapes() {
        assert_eq!(probabilities_from_tensor(&[3, 2], &[0.1; 6]), None);
        assert_eq!(probabilities_from_tensor(&[1, 2], &[0.1]), None);
        assert_eq!(probabilities_from_tensor(&[1, 3], &[0.1; 3]), None);
    }

    #[test]
    fn test_importances_sidecar_path() {
        let path = importances_path(Path::new("models/strokerisk_model_rf.onnx"));
        assert_eq!(path, Path::new("models/strokerisk_model_rf.importances.json"));
    }

    #[test]
    fn test_load_importances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rf.importances.json");

        assert_eq!(load_importances(&path).unwrap(), None);

        let values: Vec<f64> = (0..FEATURE_COUNT).map(|i| i as f64 / 100.0).collect();
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(serde_json::to_string(&values).unwrap().as_bytes())
            .unwrap();

        assert_eq!(load_importances(&path).unwrap(), Some(values));
    }

    #[test]
    fn test_load_importances_rejects_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rf.importances.json");
        std::fs::write(&path, "[0.5, 0.5]").unwrap();

        let err = load_importances(&path).unwrap_err();
        assert!(err.to_string().contains("expected 21"));
    }

    #[test]
    fn test_missing_model_file_is_an_error() {
        let loader = ModelLoader::default();
        let err = match loader.load_model("does/not/exist.onnx", "missing") {
            Ok(_) => panic!("loading a missing file must fail"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("Model file not found"));
    }
}
