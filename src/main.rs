//! Stroke Risk - Main Entry Point
//!
//! Reads patient records (one JSON object per line) from stdin, scores each
//! with the primary model and the comparison models, and writes one JSON
//! assessment per line to stdout.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};
use stroke_risk::{
    config::AppConfig,
    logging,
    models::{comparison::ModelComparison, inference::StrokePredictor, loader::ModelLoader},
    types::{assessment::Assessment, patient::PatientInput, prediction::RiskLabel},
};
use tracing::{debug, info, warn};

/// Counters for the end-of-run summary
#[derive(Default)]
struct RunStats {
    assessed: u64,
    high_risk: u64,
    failed: u64,
    unreadable: u64,
    compared: u64,
    total_time: Duration,
}

impl RunStats {
    fn record(&mut self, assessment: &Assessment, elapsed: Duration) {
        self.assessed += 1;
        self.total_time += elapsed;
        match assessment.result.risk_level {
            RiskLabel::High => self.high_risk += 1,
            RiskLabel::Error => self.failed += 1,
            RiskLabel::Low => {}
        }
        if assessment.comparison.is_some() {
            self.compared += 1;
        }
    }

    fn mean_us(&self) -> u128 {
        if self.assessed == 0 {
            0
        } else {
            self.total_time.as_micros() / self.assessed as u128
        }
    }

    fn print_summary(&self) {
        info!("╔══════════════════════════════════════════════════╗");
        info!("║           STROKE RISK - ASSESSMENT SUMMARY        ║");
        info!("╠══════════════════════════════════════════════════╣");
        info!("║ Patients Assessed:   {:>8}                     ║", self.assessed);
        info!("║ High Risk:           {:>8}                     ║", self.high_risk);
        info!("║ Failed Predictions:  {:>8}                     ║", self.failed);
        info!("║ Unreadable Records:  {:>8}                     ║", self.unreadable);
        info!("║ With Comparison:     {:>8}                     ║", self.compared);
        info!("║ Mean Latency (μs):   {:>8}                     ║", self.mean_us());
        info!("╚══════════════════════════════════════════════════╝");
    }
}

fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging, env!("CARGO_CRATE_NAME"))?;

    info!("Starting stroke risk assessment");

    let loader = ModelLoader::with_threads(config.models.onnx_threads)?;
    let models = loader.load_configured(&config.models)?;
    info!(models = ?models.model_names(), "Models loaded");

    let predictor = StrokePredictor::new(models.primary.clone())
        .with_significant_change(config.assessment.significant_change_percent);
    info!(
        "Feature preprocessor initialized ({} features)",
        predictor.preprocessor().feature_count()
    );

    let comparison = ModelComparison::new(models.comparison.clone(), config.assessment.clone());

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut stats = RunStats::default();

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line.context("Failed to read from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let start_time = Instant::now();
        let mut assessment = match serde_json::from_str::<PatientInput>(&line) {
            Ok(input) => {
                let result = predictor.predict(&input);
                Assessment::new(input, predictor.model_name(), result)
            }
            Err(e) => {
                warn!(line = index + 1, error = %e, "Failed to deserialize patient record");
                stats.unreadable += 1;
                Assessment::unreadable(predictor.model_name(), &e)
            }
        };

        if assessment.result.is_success() && comparison.model_count() > 0 {
            match comparison.compare(&assessment.input) {
                Ok(report) => assessment = assessment.with_comparison(report),
                Err(e) => warn!(
                    assessment_id = %assessment.assessment_id,
                    error = %format!("{:#}", e),
                    "Model comparison failed"
                ),
            }
        }

        let elapsed = start_time.elapsed();
        stats.record(&assessment, elapsed);

        debug!(
            assessment_id = %assessment.assessment_id,
            patient_id = ?assessment.patient_id,
            risk_level = %assessment.result.risk_level,
            processing_time_us = elapsed.as_micros(),
            "Patient assessed"
        );

        serde_json::to_writer(&mut out, &assessment).context("Failed to write assessment")?;
        writeln!(out)?;
    }

    out.flush()?;
    stats.print_summary();

    Ok(())
}
