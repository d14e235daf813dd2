//! Model Evaluation Tool
//!
//! Scores every configured model against the validation CSV and prints
//! accuracy, ROC AUC, precision, recall and F1 side by side.
//!
//! Usage: evaluate-models [metric] [--json]

use anyhow::Result;
use stroke_risk::{
    config::AppConfig,
    evaluation::{evaluate_all, rank_by, Metric, ModelEvaluation, ValidationSet},
    logging,
    models::loader::ModelLoader,
};
use tracing::{info, warn};

fn print_summary(evaluations: &[ModelEvaluation], data: &ValidationSet, metric: Metric) {
    info!("╔══════════════════════════════════════════════════════════════╗");
    info!("║              STROKE RISK - MODEL EVALUATION                  ║");
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!(
        "║ Validation Rows: {:>8}  │  Stroke Cases: {:>8}          ║",
        data.len(),
        data.positives()
    );
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!(
        "║ {:<16} {:>8} {:>8} {:>8} {:>8} {:>8}     ║",
        "Model", "Accuracy", "ROC AUC", "Prec.", "Recall", "F1"
    );
    for evaluation in evaluations {
        let auc = evaluation
            .roc_auc
            .map(|auc| format!("{:.4}", auc))
            .unwrap_or_else(|| "n/a".to_string());
        info!(
            "║ {:<16} {:>8.4} {:>8} {:>8.4} {:>8.4} {:>8.4}     ║",
            evaluation.model,
            evaluation.accuracy,
            auc,
            evaluation.precision,
            evaluation.recall,
            evaluation.f1_score
        );
    }
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║ Confusion Matrices [[tn, fp], [fn, tp]]:                     ║");
    for evaluation in evaluations {
        info!(
            "║   {:<16} {:?}",
            evaluation.model,
            evaluation.confusion_matrix.as_array()
        );
    }
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║ Ranking by {}:", metric);
    for (rank, (model, value)) in rank_by(evaluations, metric).iter().enumerate() {
        info!("║   {}. {:<16} {:.4}", rank + 1, model, value);
    }
    info!("╚══════════════════════════════════════════════════════════════╝");
}

fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging, env!("CARGO_CRATE_NAME"))?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let json = args.iter().any(|arg| arg == "--json");
    let metric: Metric = match args.iter().find(|arg| !arg.starts_with("--")) {
        Some(name) => name.parse()?,
        None => Metric::RocAuc,
    };

    info!(
        validation = %config.validation.path,
        metric = %metric,
        "Starting model evaluation"
    );

    let data = ValidationSet::from_csv(&config.validation.path, &config.validation.target_column)?;

    let loader = ModelLoader::with_threads(config.models.onnx_threads)?;
    let models = loader.load_configured(&config.models)?;

    let evaluations = evaluate_all(&models.all(), &data);
    if evaluations.len() < models.model_names().len() {
        warn!(
            evaluated = evaluations.len(),
            loaded = models.model_names().len(),
            "Some models could not be evaluated"
        );
    }

    print_summary(&evaluations, &data, metric);

    if json {
        println!("{}", serde_json::to_string_pretty(&evaluations)?);
    }

    Ok(())
}
