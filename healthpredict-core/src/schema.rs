//! Schema registry: the declarative table behind every form.
//!
//! Each [`DatasetKind`] maps to a [`DatasetSchema`] holding the ordered
//! [`FieldSpec`]s, the [`ValidationRule`] that gates submission, and the
//! label-to-message lookup. Field names are the exact column names the
//! corresponding trained model was fitted on and must not be normalized.

use crate::error::ValidationError;
use crate::predict::{Outcome, Outcomes, Tone};
use crate::record::{
    AgeGroup, Appetite, Choice, FieldLookup, FieldValue, Normality, Presence, Specialty,
    TestResult, YesNo,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three supported prediction domains.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    #[default]
    Diabetes,
    HospitalReadmission,
    KidneyDisease,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::Diabetes,
        DatasetKind::HospitalReadmission,
        DatasetKind::KidneyDisease,
    ];

    /// Selector used in URLs and configuration keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diabetes => "diabetes",
            Self::HospitalReadmission => "hospital_readmission",
            Self::KidneyDisease => "kidney_disease",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Diabetes => "Diabetes",
            Self::HospitalReadmission => "Hospital Readmission",
            Self::KidneyDisease => "Kidney Disease",
        }
    }

    /// Registry entry for this dataset.
    pub fn schema(&self) -> &'static DatasetSchema {
        match self {
            Self::Diabetes => &DIABETES,
            Self::HospitalReadmission => &HOSPITAL_READMISSION,
            Self::KidneyDisease => &KIDNEY_DISEASE,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for DatasetKind {
    type Err = ValidationError;

    /// Accepts the selector (`kidney_disease`) or the display name
    /// (`Kidney Disease`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownDataset {
                value: s.to_string(),
            })
    }
}

/// Value domain of a single input field.
///
/// Numeric bounds double as widget constraints: entered values are clamped
/// to `[min, max]` when coerced. Categorical fields default to their first
/// choice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Continuous {
        min: f64,
        max: f64,
        default: f64,
        step: f64,
    },
    Integer {
        min: i64,
        max: i64,
        default: i64,
        step: i64,
    },
    Categorical {
        choices: &'static [&'static str],
    },
    Text {
        default: &'static str,
    },
}

/// One input field of a dataset form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    /// Model column name, reproduced literally.
    pub name: &'static str,
    pub label: &'static str,
    pub help: &'static str,
    /// Display column (1 or 2). Cosmetic only.
    pub column: u8,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Value a freshly rendered form starts with.
    pub fn default_value(&self) -> FieldValue {
        match self.kind {
            FieldKind::Continuous { default, .. } => FieldValue::Float(default),
            FieldKind::Integer { default, .. } => FieldValue::Integer(default),
            FieldKind::Categorical { choices } => {
                FieldValue::Text(choices.first().copied().unwrap_or_default().to_string())
            }
            FieldKind::Text { default } => FieldValue::Text(default.to_string()),
        }
    }

    /// Short description of the accepted type, used in error messages.
    pub fn expected(&self) -> &'static str {
        match self.kind {
            FieldKind::Continuous { .. } => "a number",
            FieldKind::Integer { .. } => "a whole number",
            FieldKind::Categorical { .. } => "one of the listed choices",
            FieldKind::Text { .. } => "text",
        }
    }

    /// Coerce raw text entry into a typed value, clamping numbers to the
    /// field bounds the way the input widget does.
    pub fn coerce(&self, raw: &str) -> Result<FieldValue, ValidationError> {
        let trimmed = raw.trim();
        match self.kind {
            FieldKind::Continuous { min, max, .. } => {
                let value = parse_finite(trimmed).ok_or_else(|| self.wrong_type(raw))?;
                Ok(FieldValue::Float(value.clamp(min, max)))
            }
            FieldKind::Integer { min, max, .. } => {
                let value = parse_finite(trimmed)
                    .filter(|v| v.fract() == 0.0)
                    .ok_or_else(|| self.wrong_type(raw))?;
                Ok(FieldValue::Integer(
                    value.clamp(min as f64, max as f64) as i64
                ))
            }
            FieldKind::Categorical { choices } => {
                if choices.contains(&trimmed) {
                    Ok(FieldValue::Text(trimmed.to_string()))
                } else {
                    Err(ValidationError::UnknownChoice {
                        name: self.name.to_string(),
                        value: raw.to_string(),
                        allowed: choices.join(", "),
                    })
                }
            }
            FieldKind::Text { .. } => Ok(FieldValue::Text(trimmed.to_string())),
        }
    }

    /// Coerce a JSON value. Strings go through [`FieldSpec::coerce`], so
    /// `"42"` is as good as `42` for a numeric field.
    pub fn coerce_json(&self, value: &serde_json::Value) -> Result<FieldValue, ValidationError> {
        match (value, &self.kind) {
            (serde_json::Value::String(s), _) => self.coerce(s),
            (
                serde_json::Value::Number(n),
                FieldKind::Continuous { .. } | FieldKind::Integer { .. },
            ) => self.coerce(&n.to_string()),
            (other, _) => Err(self.wrong_type(&other.to_string())),
        }
    }

    /// Type-check an already coerced value without clamping it.
    ///
    /// Integers are accepted for continuous fields and whole floats for
    /// integer fields; the result carries the field's own representation.
    pub fn check(&self, value: &FieldValue) -> Result<FieldValue, ValidationError> {
        match (&self.kind, value) {
            (FieldKind::Continuous { .. }, FieldValue::Float(f)) if f.is_finite() => {
                Ok(FieldValue::Float(*f))
            }
            (FieldKind::Continuous { .. }, FieldValue::Integer(i)) => {
                Ok(FieldValue::Float(*i as f64))
            }
            (FieldKind::Integer { .. }, FieldValue::Integer(i)) => Ok(FieldValue::Integer(*i)),
            (FieldKind::Integer { .. }, FieldValue::Float(f))
                if f.is_finite() && f.fract() == 0.0 =>
            {
                Ok(FieldValue::Integer(*f as i64))
            }
            (FieldKind::Categorical { choices }, FieldValue::Text(s)) => {
                if choices.contains(&s.as_str()) {
                    Ok(value.clone())
                } else {
                    Err(ValidationError::UnknownChoice {
                        name: self.name.to_string(),
                        value: s.clone(),
                        allowed: choices.join(", "),
                    })
                }
            }
            (FieldKind::Text { .. }, FieldValue::Text(_)) => Ok(value.clone()),
            _ => Err(self.wrong_type(&value.to_string())),
        }
    }

    fn wrong_type(&self, value: &str) -> ValidationError {
        ValidationError::WrongType {
            name: self.name.to_string(),
            expected: self.expected(),
            value: value.to_string(),
        }
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Result of applying a [`ValidationRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected { message: &'static str },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Dataset-specific predicate gating submission before any model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationRule {
    AcceptAll,
    /// Rejects when any listed numeric field is zero (or absent).
    RequireNonZero {
        fields: &'static [&'static str],
        message: &'static str,
    },
}

impl ValidationRule {
    pub fn evaluate<R: FieldLookup + ?Sized>(&self, record: &R) -> Verdict {
        match *self {
            Self::AcceptAll => Verdict::Accepted,
            Self::RequireNonZero { fields, message } => {
                if fields
                    .iter()
                    .any(|name| record.number(name).is_none_or(|v| v == 0.0))
                {
                    Verdict::Rejected { message }
                } else {
                    Verdict::Accepted
                }
            }
        }
    }
}

/// One registry entry.
#[derive(Debug, Serialize)]
pub struct DatasetSchema {
    pub kind: DatasetKind,
    pub fields: &'static [FieldSpec],
    pub rule: ValidationRule,
    #[serde(skip)]
    pub outcomes: Outcomes,
}

impl DatasetSchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Fields shown in display column `column`, in registry order.
    pub fn column(&self, column: u8) -> impl Iterator<Item = &'static FieldSpec> + '_ {
        self.fields.iter().filter(move |f| f.column == column)
    }
}

const fn field(
    name: &'static str,
    label: &'static str,
    help: &'static str,
    column: u8,
    kind: FieldKind,
) -> FieldSpec {
    FieldSpec {
        name,
        label,
        help,
        column,
        kind,
    }
}

const YES_NO: &[&str] = YesNo::CHOICES;
const TEST_RESULTS: &[&str] = TestResult::CHOICES;
const NORMALITY: &[&str] = Normality::CHOICES;
const PRESENCE: &[&str] = Presence::CHOICES;
const AGE_GROUPS: &[&str] = AgeGroup::CHOICES;
const SPECIALTIES: &[&str] = Specialty::CHOICES;

static DIABETES_FIELDS: [FieldSpec; 8] = [
    field(
        "Pregnancies",
        "Pregnancies",
        "Number of pregnancies",
        1,
        FieldKind::Integer {
            min: 0,
            max: 20,
            default: 0,
            step: 1,
        },
    ),
    field(
        "Glucose",
        "Glucose (mg/dL)",
        "Blood sugar level",
        1,
        FieldKind::Continuous {
            min: 0.0,
            max: 300.0,
            default: 100.0,
            step: 1.0,
        },
    ),
    field(
        "BloodPressure",
        "Blood Pressure (mm Hg)",
        "Diastolic blood pressure",
        1,
        FieldKind::Continuous {
            min: 0.0,
            max: 200.0,
            default: 70.0,
            step: 1.0,
        },
    ),
    field(
        "SkinThickness",
        "Skin Thickness (mm)",
        "Triceps skin fold thickness",
        1,
        FieldKind::Continuous {
            min: 0.0,
            max: 100.0,
            default: 20.0,
            step: 1.0,
        },
    ),
    field(
        "Insulin",
        "Insulin (µU/mL)",
        "Serum insulin level",
        2,
        FieldKind::Continuous {
            min: 0.0,
            max: 1000.0,
            default: 80.0,
            step: 1.0,
        },
    ),
    field(
        "BMI",
        "BMI (kg/m²)",
        "Body Mass Index",
        2,
        FieldKind::Continuous {
            min: 0.0,
            max: 70.0,
            default: 25.0,
            step: 0.1,
        },
    ),
    field(
        "DiabetesPedigreeFunction",
        "Diabetes Pedigree Function",
        "Genetic diabetes score",
        2,
        FieldKind::Continuous {
            min: 0.0,
            max: 2.5,
            default: 0.5,
            step: 0.01,
        },
    ),
    field(
        "Age",
        "Age (years)",
        "Age in years",
        2,
        FieldKind::Integer {
            min: 1,
            max: 120,
            default: 30,
            step: 1,
        },
    ),
];

static HOSPITAL_FIELDS: [FieldSpec; 16] = [
    field("age", "Age Group", "Age range", 1, FieldKind::Categorical { choices: AGE_GROUPS }),
    field(
        "time_in_hospital",
        "Time in Hospital (days)",
        "Days spent in hospital",
        1,
        FieldKind::Integer {
            min: 1,
            max: 14,
            default: 1,
            step: 1,
        },
    ),
    field(
        "n_lab_procedures",
        "Lab Procedures",
        "Number of lab tests",
        1,
        FieldKind::Integer {
            min: 0,
            max: 100,
            default: 0,
            step: 1,
        },
    ),
    field(
        "n_procedures",
        "Procedures",
        "Number of procedures",
        1,
        FieldKind::Integer {
            min: 0,
            max: 10,
            default: 0,
            step: 1,
        },
    ),
    field(
        "n_medications",
        "Medications",
        "Number of medications",
        1,
        FieldKind::Integer {
            min: 1,
            max: 100,
            default: 1,
            step: 1,
        },
    ),
    field(
        "n_outpatient",
        "Outpatient Visits",
        "Outpatient visits in last year",
        1,
        FieldKind::Integer {
            min: 0,
            max: 50,
            default: 0,
            step: 1,
        },
    ),
    field(
        "n_inpatient",
        "Inpatient Admissions",
        "Inpatient admissions in last year",
        1,
        FieldKind::Integer {
            min: 0,
            max: 50,
            default: 0,
            step: 1,
        },
    ),
    field(
        "n_emergency",
        "Emergency Visits",
        "Emergency visits in last year",
        1,
        FieldKind::Integer {
            min: 0,
            max: 50,
            default: 0,
            step: 1,
        },
    ),
    field(
        "medical_specialty",
        "Medical Specialty",
        "Primary medical specialty",
        2,
        FieldKind::Categorical { choices: SPECIALTIES },
    ),
    field(
        "diag_1",
        "Primary Diagnosis (ICD9)",
        "Primary diagnosis code",
        2,
        FieldKind::Text { default: "250.01" },
    ),
    field(
        "diag_2",
        "Secondary Diagnosis (ICD9)",
        "Secondary diagnosis code",
        2,
        FieldKind::Text { default: "401" },
    ),
    field(
        "diag_3",
        "Additional Diagnosis (ICD9)",
        "Additional diagnosis code",
        2,
        FieldKind::Text { default: "428" },
    ),
    field(
        "glucose_test",
        "Glucose Test Result",
        "Serum glucose test result",
        2,
        FieldKind::Categorical { choices: TEST_RESULTS },
    ),
    field(
        "A1Ctest",
        "A1C Test Result",
        "HbA1c test result",
        2,
        FieldKind::Categorical { choices: TEST_RESULTS },
    ),
    field(
        "change",
        "Medication Change",
        "Change in medication",
        2,
        FieldKind::Categorical { choices: YES_NO },
    ),
    field(
        "diabetes_med",
        "Diabetes Medication",
        "Prescribed diabetes medication",
        2,
        FieldKind::Categorical { choices: YES_NO },
    ),
];

static KIDNEY_FIELDS: [FieldSpec; 24] = [
    field(
        "Age",
        "Age (years)",
        "Age in years",
        1,
        FieldKind::Integer {
            min: 1,
            max: 120,
            default: 30,
            step: 1,
        },
    ),
    field(
        "Blood_Pressure",
        "Blood Pressure (mm Hg)",
        "Blood pressure",
        1,
        FieldKind::Continuous {
            min: 0.0,
            max: 200.0,
            default: 70.0,
            step: 1.0,
        },
    ),
    field(
        "Specific_Gravity",
        "Specific Gravity",
        "Urine specific gravity",
        1,
        FieldKind::Continuous {
            min: 1.0,
            max: 1.05,
            default: 1.02,
            step: 0.005,
        },
    ),
    field(
        "Albumin",
        "Albumin",
        "Albumin level in urine",
        1,
        FieldKind::Continuous {
            min: 0.0,
            max: 5.0,
            default: 0.0,
            step: 1.0,
        },
    ),
    field(
        "Sugar",
        "Sugar",
        "Sugar level in urine",
        1,
        FieldKind::Continuous {
            min: 0.0,
            max: 5.0,
            default: 0.0,
            step: 1.0,
        },
    ),
    field(
        "Red_Blood_Cells",
        "Red Blood Cells",
        "Red blood cells in urine",
        1,
        FieldKind::Categorical { choices: NORMALITY },
    ),
    field(
        "Pus_Cell",
        "Pus Cell",
        "Pus cells in urine",
        1,
        FieldKind::Categorical { choices: NORMALITY },
    ),
    field(
        "Pus_Cell_Clumps",
        "Pus Cell Clumps",
        "Presence of pus cell clumps",
        1,
        FieldKind::Categorical { choices: PRESENCE },
    ),
    field(
        "Bacteria",
        "Bacteria",
        "Presence of bacteria in urine",
        1,
        FieldKind::Categorical { choices: PRESENCE },
    ),
    field(
        "Blood_Glucose_Random",
        "Blood Glucose Random (mg/dL)",
        "Random blood glucose level",
        1,
        FieldKind::Continuous {
            min: 0.0,
            max: 500.0,
            default: 100.0,
            step: 1.0,
        },
    ),
    field(
        "Blood_Urea",
        "Blood Urea (mg/dL)",
        "Blood urea level",
        1,
        FieldKind::Continuous {
            min: 0.0,
            max: 200.0,
            default: 30.0,
            step: 1.0,
        },
    ),
    field(
        "Serum_Creatinine",
        "Serum Creatinine (mg/dL)",
        "Serum creatinine level",
        1,
        FieldKind::Continuous {
            min: 0.0,
            max: 20.0,
            default: 1.0,
            step: 0.1,
        },
    ),
    field(
        "Sodium",
        "Sodium (mEq/L)",
        "Sodium level",
        2,
        FieldKind::Continuous {
            min: 0.0,
            max: 200.0,
            default: 135.0,
            step: 1.0,
        },
    ),
    field(
        "Potassium",
        "Potassium (mEq/L)",
        "Potassium level",
        2,
        FieldKind::Continuous {
            min: 0.0,
            max: 10.0,
            default: 4.0,
            step: 0.1,
        },
    ),
    field(
        "Hemoglobin",
        "Hemoglobin (g/dL)",
        "Hemoglobin level",
        2,
        FieldKind::Continuous {
            min: 0.0,
            max: 20.0,
            default: 12.0,
            step: 0.1,
        },
    ),
    field(
        "Packed_Cell_Volume",
        "Packed Cell Volume (%)",
        "Packed cell volume",
        2,
        FieldKind::Continuous {
            min: 0.0,
            max: 60.0,
            default: 40.0,
            step: 1.0,
        },
    ),
    field(
        "White_Blood_Cell_Count",
        "White Blood Cell Count (cells/cmm)",
        "White blood cell count",
        2,
        FieldKind::Continuous {
            min: 0.0,
            max: 20000.0,
            default: 7000.0,
            step: 100.0,
        },
    ),
    field(
        "Red_Blood_Cell_Count",
        "Red Blood Cell Count (millions/cmm)",
        "Red blood cell count",
        2,
        FieldKind::Continuous {
            min: 0.0,
            max: 10.0,
            default: 5.0,
            step: 0.1,
        },
    ),
    field(
        "Hypertension",
        "Hypertension",
        "Presence of hypertension",
        2,
        FieldKind::Categorical { choices: YES_NO },
    ),
    field(
        "Diabetes_Mellitus",
        "Diabetes Mellitus",
        "Presence of diabetes",
        2,
        FieldKind::Categorical { choices: YES_NO },
    ),
    field(
        "Coronary_Artery_Disease",
        "Coronary Artery Disease",
        "Presence of coronary artery disease",
        2,
        FieldKind::Categorical { choices: YES_NO },
    ),
    field(
        "Appetite",
        "Appetite",
        "Appetite status",
        2,
        FieldKind::Categorical { choices: Appetite::CHOICES },
    ),
    field(
        "Pedal_Edema",
        "Pedal Edema",
        "Presence of pedal edema",
        2,
        FieldKind::Categorical { choices: YES_NO },
    ),
    field(
        "Anemia",
        "Anemia",
        "Presence of anemia",
        2,
        FieldKind::Categorical { choices: YES_NO },
    ),
];

static DIABETES: DatasetSchema = DatasetSchema {
    kind: DatasetKind::Diabetes,
    fields: &DIABETES_FIELDS,
    rule: ValidationRule::RequireNonZero {
        fields: &["Glucose", "BMI"],
        message: "Please enter valid values (Glucose and BMI cannot be 0).",
    },
    outcomes: Outcomes {
        positive: Outcome {
            message: "Diabetes Risk Detected",
            tone: Tone::Warning,
        },
        negative: Outcome {
            message: "No Diabetes Risk",
            tone: Tone::Success,
        },
    },
};

static HOSPITAL_READMISSION: DatasetSchema = DatasetSchema {
    kind: DatasetKind::HospitalReadmission,
    fields: &HOSPITAL_FIELDS,
    rule: ValidationRule::AcceptAll,
    outcomes: Outcomes {
        positive: Outcome {
            message: "Hospital Readmission Likely",
            tone: Tone::Warning,
        },
        negative: Outcome {
            message: "Hospital Readmission Unlikely",
            tone: Tone::Success,
        },
    },
};

static KIDNEY_DISEASE: DatasetSchema = DatasetSchema {
    kind: DatasetKind::KidneyDisease,
    fields: &KIDNEY_FIELDS,
    rule: ValidationRule::RequireNonZero {
        fields: &["Blood_Glucose_Random", "Serum_Creatinine"],
        message: "Please enter valid values (Blood Glucose and Serum Creatinine cannot be 0).",
    },
    outcomes: Outcomes {
        positive: Outcome {
            message: "Kidney Disease Risk Detected",
            tone: Tone::Warning,
        },
        negative: Outcome {
            message: "No Kidney Disease Risk",
            tone: Tone::Success,
        },
    },
};
