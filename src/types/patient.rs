//! Patient data structures for stroke risk assessment

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Valid age range in years
pub const AGE_RANGE: RangeInclusive<f64> = 0.0..=120.0;
/// Valid BMI range
pub const BMI_RANGE: RangeInclusive<f64> = 10.0..=50.0;
/// Valid average glucose range in mg/dL
pub const GLUCOSE_RANGE: RangeInclusive<f64> = 50.0..=300.0;

/// A categorical clinical attribute with a closed set of levels.
pub trait Category: Sized + Copy + 'static {
    /// Field name as it appears in patient input
    const FIELD: &'static str;
    /// Human readable name used in validation messages
    const LABEL: &'static str;
    /// All levels, in display order
    const ALL: &'static [Self];

    /// Wire representation of the level
    fn as_str(&self) -> &'static str;

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|level| level.as_str() == value)
    }

    fn options() -> Vec<&'static str> {
        Self::ALL.iter().map(|level| level.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Category for Gender {
    const FIELD: &'static str = "gender";
    const LABEL: &'static str = "Gender";
    const ALL: &'static [Self] = &[Gender::Male, Gender::Female, Gender::Other];

    fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EverMarried {
    No,
    Yes,
}

impl Category for EverMarried {
    const FIELD: &'static str = "ever_married";
    const LABEL: &'static str = "Marital status";
    const ALL: &'static [Self] = &[EverMarried::No, EverMarried::Yes];

    fn as_str(&self) -> &'static str {
        match self {
            EverMarried::No => "No",
            EverMarried::Yes => "Yes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkType {
    Private,
    #[serde(rename = "Self-employed")]
    SelfEmployed,
    #[serde(rename = "Govt_job")]
    GovtJob,
    #[serde(rename = "children")]
    Children,
    #[serde(rename = "Never_worked")]
    NeverWorked,
}

impl Category for WorkType {
    const FIELD: &'static str = "work_type";
    const LABEL: &'static str = "Work type";
    const ALL: &'static [Self] = &[
        WorkType::Private,
        WorkType::SelfEmployed,
        WorkType::GovtJob,
        WorkType::Children,
        WorkType::NeverWorked,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            WorkType::Private => "Private",
            WorkType::SelfEmployed => "Self-employed",
            WorkType::GovtJob => "Govt_job",
            WorkType::Children => "children",
            WorkType::NeverWorked => "Never_worked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResidenceType {
    Urban,
    Rural,
}

impl Category for ResidenceType {
    const FIELD: &'static str = "Residence_type";
    const LABEL: &'static str = "Residence type";
    const ALL: &'static [Self] = &[ResidenceType::Urban, ResidenceType::Rural];

    fn as_str(&self) -> &'static str {
        match self {
            ResidenceType::Urban => "Urban",
            ResidenceType::Rural => "Rural",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SmokingStatus {
    #[serde(rename = "never smoked")]
    NeverSmoked,
    #[serde(rename = "formerly smoked")]
    FormerlySmoked,
    #[serde(rename = "smokes")]
    Smokes,
    Unknown,
}

impl Category for SmokingStatus {
    const FIELD: &'static str = "smoking_status";
    const LABEL: &'static str = "Smoking status";
    const ALL: &'static [Self] = &[
        SmokingStatus::NeverSmoked,
        SmokingStatus::FormerlySmoked,
        SmokingStatus::Smokes,
        SmokingStatus::Unknown,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            SmokingStatus::NeverSmoked => "never smoked",
            SmokingStatus::FormerlySmoked => "formerly smoked",
            SmokingStatus::Smokes => "smokes",
            SmokingStatus::Unknown => "Unknown",
        }
    }
}

/// Raw patient attributes as submitted by an intake form.
///
/// Every field is optional so that missing values surface as validation
/// violations instead of deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInput {
    /// Caller-side identifier, never fed to a model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,

    /// Age in years
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,

    /// Hypertension flag (0 = no, 1 = yes). Any number is accepted here so
    /// that other values reach validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypertension: Option<f64>,

    /// Heart disease flag (0 = no, 1 = yes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_disease: Option<f64>,

    /// Average glucose level in mg/dL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_glucose_level: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bmi: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ever_married: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_type: Option<String>,

    #[serde(
        rename = "Residence_type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub residence_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoking_status: Option<String>,
}

impl PatientInput {
    /// Validate the input and convert it into a typed record.
    ///
    /// All violated constraints are collected before returning, so the
    /// error lists every problem with the submission.
    pub fn validate(&self) -> Result<PatientRecord, ValidationError> {
        let mut errors = Vec::new();

        let required = [
            ("age", self.age.is_some()),
            ("hypertension", self.hypertension.is_some()),
            ("heart_disease", self.heart_disease.is_some()),
            ("avg_glucose_level", self.avg_glucose_level.is_some()),
            ("bmi", self.bmi.is_some()),
            ("gender", self.gender.is_some()),
        ];
        for (field, present) in required {
            if !present {
                errors.push(format!("Missing required field: {}", field));
            }
        }

        if let Some(age) = self.age {
            if !AGE_RANGE.contains(&age) {
                errors.push("Age must be between 0-120".to_string());
            }
        }
        if let Some(bmi) = self.bmi {
            if !BMI_RANGE.contains(&bmi) {
                errors.push("BMI must be between 10-50".to_string());
            }
        }
        if let Some(glucose) = self.avg_glucose_level {
            if !GLUCOSE_RANGE.contains(&glucose) {
                errors.push("Glucose level must be between 50-300 mg/dL".to_string());
            }
        }

        let hypertension = flag(self.hypertension, "Hypertension", &mut errors);
        let heart_disease = flag(self.heart_disease, "Heart disease", &mut errors);

        let gender = self
            .gender
            .as_deref()
            .and_then(|value| level::<Gender>(value, &mut errors));
        let ever_married = optional_level(self.ever_married.as_deref(), EverMarried::No, &mut errors);
        let work_type = optional_level(self.work_type.as_deref(), WorkType::Private, &mut errors);
        let residence_type =
            optional_level(self.residence_type.as_deref(), ResidenceType::Urban, &mut errors);
        let smoking_status = optional_level(
            self.smoking_status.as_deref(),
            SmokingStatus::NeverSmoked,
            &mut errors,
        );

        match (
            self.age,
            hypertension,
            heart_disease,
            self.avg_glucose_level,
            self.bmi,
            gender,
            ever_married,
            work_type,
            residence_type,
            smoking_status,
        ) {
            (
                Some(age),
                Some(hypertension),
                Some(heart_disease),
                Some(avg_glucose_level),
                Some(bmi),
                Some(gender),
                Some(ever_married),
                Some(work_type),
                Some(residence_type),
                Some(smoking_status),
            ) if errors.is_empty() => Ok(PatientRecord {
                age,
                hypertension,
                heart_disease,
                avg_glucose_level,
                bmi,
                gender,
                ever_married,
                work_type,
                residence_type,
                smoking_status,
            }),
            _ => Err(ValidationError::new(errors)),
        }
    }

    /// Overlay the fields set in `changes` onto a copy of this input.
    pub fn merged_with(&self, changes: &PatientInput) -> PatientInput {
        PatientInput {
            patient_id: changes.patient_id.clone().or_else(|| self.patient_id.clone()),
            age: changes.age.or(self.age),
            hypertension: changes.hypertension.or(self.hypertension),
            heart_disease: changes.heart_disease.or(self.heart_disease),
            avg_glucose_level: changes.avg_glucose_level.or(self.avg_glucose_level),
            bmi: changes.bmi.or(self.bmi),
            gender: changes.gender.clone().or_else(|| self.gender.clone()),
            ever_married: changes.ever_married.clone().or_else(|| self.ever_married.clone()),
            work_type: changes.work_type.clone().or_else(|| self.work_type.clone()),
            residence_type: changes
                .residence_type
                .clone()
                .or_else(|| self.residence_type.clone()),
            smoking_status: changes
                .smoking_status
                .clone()
                .or_else(|| self.smoking_status.clone()),
        }
    }
}

fn flag(value: Option<f64>, label: &str, errors: &mut Vec<String>) -> Option<bool> {
    match value {
        Some(v) if v == 0.0 => Some(false),
        Some(v) if v == 1.0 => Some(true),
        Some(_) => {
            errors.push(format!("{} must be 0 or 1", label));
            None
        }
        None => None,
    }
}

fn level<C: Category>(value: &str, errors: &mut Vec<String>) -> Option<C> {
    let parsed = C::parse(value);
    if parsed.is_none() {
        errors.push(format!(
            "{} must be one of: {}",
            C::LABEL,
            C::options().join(", ")
        ));
    }
    parsed
}

fn optional_level<C: Category>(
    value: Option<&str>,
    default: C,
    errors: &mut Vec<String>,
) -> Option<C> {
    match value {
        Some(value) => level(value, errors),
        None => Some(default),
    }
}

/// Validated patient attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub age: f64,
    pub hypertension: bool,
    pub heart_disease: bool,
    pub avg_glucose_level: f64,
    pub bmi: f64,
    pub gender: Gender,
    pub ever_married: EverMarried,
    pub work_type: WorkType,
    #[serde(rename = "Residence_type")]
    pub residence_type: ResidenceType,
    pub smoking_status: SmokingStatus,
}


#[cfg(test)]
mod tests {
    use super::fixtures::reference_patient;
    use super::*;

    #[test]
    fn test_valid_input_converts_to_record() {
        let record = reference_patient().validate().unwrap();

        assert_eq!(record.age, 62.0);
        assert!(record.hypertension);
        assert!(!record.heart_disease);
        assert_eq!(record.gender, Gender::Female);
        assert_eq!(record.ever_married, EverMarried::Yes);
        assert_eq!(record.work_type, WorkType::Private);
        assert_eq!(record.residence_type, ResidenceType::Urban);
        assert_eq!(record.smoking_status, SmokingStatus::NeverSmoked);
    }

    #[test]
    fn test_reports_every_violation() {
        let input = PatientInput {
            age: Some(150.0),
            gender: Some("X".to_string()),
            ..reference_patient()
        };

        let err = input.validate().unwrap_err();
        assert_eq!(
            err.violations,
            vec![
                "Age must be between 0-120".to_string(),
                "Gender must be one of: Male, Female, Other".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_fields_are_listed() {
        let input = PatientInput {
            bmi: Some(5.0),
            ..Default::default()
        };

        let err = input.validate().unwrap_err();
        assert!(err.violations.contains(&"Missing required field: age".to_string()));
        assert!(err.violations.contains(&"Missing required field: gender".to_string()));
        assert!(err.violations.contains(&"BMI must be between 10-50".to_string()));
        // bmi is present, so it is not reported as missing
        assert!(!err.violations.contains(&"Missing required field: bmi".to_string()));
        assert_eq!(err.len(), 6);
    }

    #[test]
    fn test_optional_categoricals_default() {
        let input = PatientInput {
            ever_married: None,
            work_type: None,
            residence_type: None,
            smoking_status: None,
            ..reference_patient()
        };

        let record = input.validate().unwrap();
        assert_eq!(record.ever_married, EverMarried::No);
        assert_eq!(record.work_type, WorkType::Private);
        assert_eq!(record.residence_type, ResidenceType::Urban);
        assert_eq!(record.smoking_status, SmokingStatus::NeverSmoked);
    }

    #[test]
    fn test_rejects_unknown_levels_and_flags() {
        let input = PatientInput {
            hypertension: Some(2.0),
            work_type: Some("Astronaut".to_string()),
            smoking_status: Some("vapes".to_string()),
            ..reference_patient()
        };

        let err = input.validate().unwrap_err();
        assert_eq!(err.len(), 3);
        assert_eq!(err.violations[0], "Hypertension must be 0 or 1");
        assert!(err.violations[1].starts_with("Work type must be one of: Private"));
        assert!(err.violations[2].starts_with("Smoking status must be one of:"));
    }

    #[test]
    fn test_out_of_range_flags_reach_validation() {
        let json = r#"{
            "age": 150, "hypertension": -1, "heart_disease": 256,
            "avg_glucose_level": 98.5, "bmi": 31.2, "gender": "Male"
        }"#;

        let input: PatientInput = serde_json::from_str(json).unwrap();
        let err = input.validate().unwrap_err();

        assert_eq!(
            err.to_string(),
            "Age must be between 0-120 | Hypertension must be 0 or 1 | Heart disease must be 0 or 1"
        );
    }

    #[test]
    fn test_whole_number_float_flags_are_accepted() {
        let json = r#"{
            "age": 45, "hypertension": 1.0, "heart_disease": 0.0,
            "avg_glucose_level": 98.5, "bmi": 31.2, "gender": "Male"
        }"#;

        let input: PatientInput = serde_json::from_str(json).unwrap();
        let record = input.validate().unwrap();
        assert!(record.hypertension);
        assert!(!record.heart_disease);

        let fractional = PatientInput {
            hypertension: Some(0.5),
            ..input
        };
        assert_eq!(
            fractional.validate().unwrap_err().violations,
            vec!["Hypertension must be 0 or 1"]
        );
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let input = PatientInput {
            age: Some(120.0),
            bmi: Some(10.0),
            avg_glucose_level: Some(300.0),
            ..reference_patient()
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_deserializes_wire_names() {
        let json = r#"{
            "age": 45, "hypertension": 0, "heart_disease": 1,
            "avg_glucose_level": 98.5, "bmi": 31.2, "gender": "Male",
            "ever_married": "No", "work_type": "Self-employed",
            "Residence_type": "Rural", "smoking_status": "formerly smoked"
        }"#;

        let input: PatientInput = serde_json::from_str(json).unwrap();
        let record = input.validate().unwrap();

        assert_eq!(record.residence_type, ResidenceType::Rural);
        assert_eq!(record.work_type, WorkType::SelfEmployed);
        assert_eq!(record.smoking_status, SmokingStatus::FormerlySmoked);
        assert!(record.heart_disease);
    }

    #[test]
    fn test_merged_with_overrides_only_set_fields() {
        let base = reference_patient();
        let changes = PatientInput {
            age: Some(70.0),
            bmi: Some(24.0),
            ..Default::default()
        };

        let merged = base.merged_with(&changes);
        assert_eq!(merged.age, Some(70.0));
        assert_eq!(merged.bmi, Some(24.0));
        assert_eq!(merged.gender, base.gender);
        assert_eq!(merged.avg_glucose_level, base.avg_glucose_level);
    }
}
