//! Sample Patient Generator
//!
//! Writes synthetic patient records to stdout, one JSON object per line,
//! for feeding the `stroke-risk` binary.
//!
//! Usage: sample-patients [count] [high_risk_rate]

use rand::Rng;
use std::io::{self, Write};
use stroke_risk::types::patient::{
    Category, EverMarried, Gender, PatientInput, ResidenceType, SmokingStatus, WorkType,
};
use tracing::info;

/// Patient generator for testing
struct PatientGenerator {
    rng: rand::rngs::ThreadRng,
    patient_counter: u64,
}

impl PatientGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            patient_counter: 0,
        }
    }

    fn next_id(&mut self) -> String {
        self.patient_counter += 1;
        format!("PT-{:06}", self.patient_counter)
    }

    /// Young, healthy patient profile
    fn generate_low_risk(&mut self) -> PatientInput {
        let age = self.rng.gen_range(18.0..50.0_f64).round();

        PatientInput {
            patient_id: Some(self.next_id()),
            age: Some(age),
            hypertension: Some(flag(self.rng.gen_bool(0.05))),
            heart_disease: Some(flag(self.rng.gen_bool(0.02))),
            avg_glucose_level: Some(round1(self.rng.gen_range(70.0..120.0))),
            bmi: Some(round1(self.rng.gen_range(19.0..28.0))),
            gender: Some(self.choice(&[Gender::Male, Gender::Female])),
            ever_married: Some(self.choice(EverMarried::ALL)),
            work_type: Some(self.choice(&[WorkType::Private, WorkType::GovtJob, WorkType::SelfEmployed])),
            residence_type: Some(self.choice(ResidenceType::ALL)),
            smoking_status: Some(self.choice(&[SmokingStatus::NeverSmoked, SmokingStatus::Unknown])),
        }
    }

    /// Older patient with cardiovascular risk factors
    fn generate_high_risk(&mut self) -> PatientInput {
        let age = self.rng.gen_range(60.0..90.0_f64).round();

        PatientInput {
            patient_id: Some(self.next_id()),
            age: Some(age),
            hypertension: Some(flag(self.rng.gen_bool(0.7))),
            heart_disease: Some(flag(self.rng.gen_bool(0.4))),
            avg_glucose_level: Some(round1(self.rng.gen_range(140.0..280.0))),
            bmi: Some(round1(self.rng.gen_range(27.0..45.0))),
            gender: Some(self.choice(&[Gender::Male, Gender::Female])),
            ever_married: Some(EverMarried::Yes.as_str().to_string()),
            work_type: Some(self.choice(&[WorkType::Private, WorkType::SelfEmployed])),
            residence_type: Some(self.choice(ResidenceType::ALL)),
            smoking_status: Some(self.choice(&[SmokingStatus::FormerlySmoked, SmokingStatus::Smokes])),
        }
    }

    fn choice<C: Category>(&mut self, choices: &[C]) -> String {
        choices[self.rng.gen_range(0..choices.len())].as_str().to_string()
    }
}

fn flag(set: bool) -> f64 {
    if set {
        1.0
    } else {
        0.0
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// High risk share from the command line, defaulting to 0.2 and clamped to `[0, 1]`
fn parse_rate(arg: Option<&str>) -> f64 {
    arg.and_then(|s| s.parse::<f64>().ok())
        .filter(|rate| rate.is_finite())
        .unwrap_or(0.2)
        .clamp(0.0, 1.0)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_patients=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let count: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(20);
    let high_risk_rate = parse_rate(args.get(2).map(String::as_str));

    info!(count = count, high_risk_rate = high_risk_rate, "Generating sample patients");

    let mut generator = PatientGenerator::new();
    let mut rng = rand::thread_rng();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut low_risk_count = 0;
    let mut high_risk_count = 0;

    for _ in 0..count {
        let patient = if rng.gen_bool(high_risk_rate) {
            high_risk_count += 1;
            generator.generate_high_risk()
        } else {
            low_risk_count += 1;
            generator.generate_low_risk()
        };

        serde_json::to_writer(&mut out, &patient)?;
        writeln!(out)?;
    }

    out.flush()?;
    info!(
        "Completed! Generated {} patients ({} low risk profile, {} high risk profile)",
        count, low_risk_count, high_risk_count
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_parsing() {
        assert_eq!(parse_rate(None), 0.2);
        assert_eq!(parse_rate(Some("0.5")), 0.5);
        assert_eq!(parse_rate(Some("3")), 1.0);
        assert_eq!(parse_rate(Some("-1")), 0.0);
        assert_eq!(parse_rate(Some("abc")), 0.2);
    }

    #[test]
    fn test_non_finite_rate_falls_back_to_default() {
        assert_eq!(parse_rate(Some("nan")), 0.2);
        assert_eq!(parse_rate(Some("inf")), 0.2);
    }

    #[test]
    fn test_generated_patients_validate() {
        let mut generator = PatientGenerator::new();
        for _ in 0..50 {
            assert!(generator.generate_low_risk().validate().is_ok());
            assert!(generator.generate_high_risk().validate().is_ok());
        }
    }
}
