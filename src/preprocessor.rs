//! Feature preprocessing for stroke risk model inference.
//!
//! Turns patient attributes into the standardized, one-hot encoded
//! vector the fitted classifiers were trained on. Column positions are
//! what the models consume, so the order below is fixed.

use crate::error::ValidationError;
use crate::types::patient::{
    Category, EverMarried, Gender, PatientInput, PatientRecord, ResidenceType, SmokingStatus,
    WorkType, AGE_RANGE, BMI_RANGE, GLUCOSE_RANGE,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of model input features
pub const FEATURE_COUNT: usize = 21;

/// Model input columns, in training order.
///
/// Baseline levels (Female, never married, Govt_job, Rural, Unknown
/// smoking status) have no column of their own.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age",
    "hypertension",
    "heart_disease",
    "avg_glucose_level",
    "bmi",
    "gender_Male",
    "gender_Other",
    "ever_married_Yes",
    "work_type_Never_worked",
    "work_type_Private",
    "work_type_Self-employed",
    "work_type_children",
    "Residence_type_Urban",
    "smoking_status_formerly smoked",
    "smoking_status_never smoked",
    "smoking_status_smokes",
    "age_group_19-30",
    "age_group_31-45",
    "age_group_46-60",
    "age_group_61-75",
    "age_group_76+",
];

const AGE: usize = 0;
const HYPERTENSION: usize = 1;
const HEART_DISEASE: usize = 2;
const GLUCOSE: usize = 3;
const BMI: usize = 4;
const GENDER_MALE: usize = 5;
const GENDER_OTHER: usize = 6;
const EVER_MARRIED_YES: usize = 7;
const WORK_NEVER_WORKED: usize = 8;
const WORK_PRIVATE: usize = 9;
const WORK_SELF_EMPLOYED: usize = 10;
const WORK_CHILDREN: usize = 11;
const RESIDENCE_URBAN: usize = 12;
const SMOKING_FORMERLY: usize = 13;
const SMOKING_NEVER: usize = 14;
const SMOKING_SMOKES: usize = 15;
const AGE_GROUP_START: usize = 16;

/// Training-set mean and standard deviation of a numeric feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Standardizer {
    pub mean: f64,
    pub std: f64,
}

impl Standardizer {
    pub const fn new(mean: f64, std: f64) -> Self {
        Self { mean, std }
    }

    /// z-score of `value`
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

pub const AGE_SCALING: Standardizer = Standardizer::new(43.23, 22.61);
pub const GLUCOSE_SCALING: Standardizer = Standardizer::new(106.15, 45.28);
pub const BMI_SCALING: Standardizer = Standardizer::new(28.89, 7.85);

/// Age bucket derived from raw age
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeGroup {
    UpTo30,
    From31To45,
    From46To60,
    From61To75,
    Over75,
}

impl AgeGroup {
    /// Bucket for a raw (unstandardized) age.
    ///
    /// Everything up to 30 lands in the first bucket, including ages
    /// below 19.
    pub fn from_age(age: f64) -> Self {
        if age <= 30.0 {
            AgeGroup::UpTo30
        } else if age <= 45.0 {
            AgeGroup::From31To45
        } else if age <= 60.0 {
            AgeGroup::From46To60
        } else if age <= 75.0 {
            AgeGroup::From61To75
        } else {
            AgeGroup::Over75
        }
    }

    /// Position of this bucket's indicator column
    pub fn column(&self) -> usize {
        AGE_GROUP_START
            + match self {
                AgeGroup::UpTo30 => 0,
                AgeGroup::From31To45 => 1,
                AgeGroup::From46To60 => 2,
                AgeGroup::From61To75 => 3,
                AgeGroup::Over75 => 4,
            }
    }
}

/// Fixed-order model input row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f32; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Look up a column by name
    pub fn get(&self, name: &str) -> Option<f32> {
        FEATURE_NAMES
            .iter()
            .position(|&column| column == name)
            .map(|index| self.values[index])
    }

    /// `(column, value)` pairs in model order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }

    /// Values of the five age bucket columns
    pub fn age_group_indicators(&self) -> &[f32] {
        &self.values[AGE_GROUP_START..]
    }
}

/// Valid range and training statistics of a numeric feature
#[derive(Debug, Clone, Serialize)]
pub struct FeatureRange {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

/// Preprocessor that transforms patient records into model input features.
///
/// Matches the preprocessing done when the models were fit.
pub struct FeaturePreprocessor {
    age: Standardizer,
    glucose: Standardizer,
    bmi: Standardizer,
}

impl FeaturePreprocessor {
    /// Create a preprocessor with the training-set statistics.
    pub fn new() -> Self {
        Self {
            age: AGE_SCALING,
            glucose: GLUCOSE_SCALING,
            bmi: BMI_SCALING,
        }
    }

    /// Validate raw input and build its feature vector.
    pub fn prepare(&self, input: &PatientInput) -> Result<FeatureVector, ValidationError> {
        let record = input.validate()?;
        Ok(self.preprocess(&record))
    }

    /// Build the feature vector for a validated record.
    pub fn preprocess(&self, record: &PatientRecord) -> FeatureVector {
        let mut values = [0.0_f32; FEATURE_COUNT];

        values[AGE] = self.age.apply(record.age) as f32;
        values[HYPERTENSION] = indicator(record.hypertension);
        values[HEART_DISEASE] = indicator(record.heart_disease);
        values[GLUCOSE] = self.glucose.apply(record.avg_glucose_level) as f32;
        values[BMI] = self.bmi.apply(record.bmi) as f32;

        match record.gender {
            Gender::Male => values[GENDER_MALE] = 1.0,
            Gender::Other => values[GENDER_OTHER] = 1.0,
            Gender::Female => {}
        }

        if record.ever_married == EverMarried::Yes {
            values[EVER_MARRIED_YES] = 1.0;
        }

        match record.work_type {
            WorkType::NeverWorked => values[WORK_NEVER_WORKED] = 1.0,
            WorkType::Private => values[WORK_PRIVATE] = 1.0,
            WorkType::SelfEmployed => values[WORK_SELF_EMPLOYED] = 1.0,
            WorkType::Children => values[WORK_CHILDREN] = 1.0,
            WorkType::GovtJob => {}
        }

        if record.residence_type == ResidenceType::Urban {
            values[RESIDENCE_URBAN] = 1.0;
        }

        match record.smoking_status {
            SmokingStatus::FormerlySmoked => values[SMOKING_FORMERLY] = 1.0,
            SmokingStatus::NeverSmoked => values[SMOKING_NEVER] = 1.0,
            SmokingStatus::Smokes => values[SMOKING_SMOKES] = 1.0,
            SmokingStatus::Unknown => {}
        }

        values[AgeGroup::from_age(record.age).column()] = 1.0;

        FeatureVector { values }
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in model order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }

    /// Valid ranges and scaling statistics for numeric features
    pub fn feature_ranges(&self) -> BTreeMap<&'static str, FeatureRange> {
        let range = |bounds: &std::ops::RangeInclusive<f64>, scaling: &Standardizer| FeatureRange {
            min: *bounds.start(),
            max: *bounds.end(),
            mean: scaling.mean,
            std: scaling.std,
        };

        BTreeMap::from([
            ("age", range(&AGE_RANGE, &self.age)),
            ("avg_glucose_level", range(&GLUCOSE_RANGE, &self.glucose)),
            ("bmi", range(&BMI_RANGE, &self.bmi)),
        ])
    }

    /// Valid levels for every categorical input field
    pub fn categorical_options(&self) -> BTreeMap<&'static str, Vec<&'static str>> {
        BTreeMap::from([
            (Gender::FIELD, Gender::options()),
            ("hypertension", vec!["No", "Yes"]),
            ("heart_disease", vec!["No", "Yes"]),
            (EverMarried::FIELD, EverMarried::options()),
            (WorkType::FIELD, WorkType::options()),
            (ResidenceType::FIELD, ResidenceType::options()),
            (SmokingStatus::FIELD, SmokingStatus::options()),
        ])
    }
}

impl Default for FeaturePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn indicator(flag: bool) -> f32 {
    if flag {
        1.0
    } else {
        0.0
    }
}
