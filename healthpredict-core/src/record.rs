//! Record builder: typed, exact-shape rows for each dataset.
//!
//! Raw field values are checked against the dataset's [`FieldSpec`]s and
//! assembled into a statically shaped record. [`InputRecord::columns`]
//! yields the row in the column order and spelling the trained model
//! expects. Values pass through as entered; there is no unit conversion.
//!
//! [`FieldSpec`]: crate::schema::FieldSpec

use crate::error::ValidationError;
use crate::schema::DatasetKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single scalar cell of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Named-value access shared by raw value maps and built records, so a
/// validation rule can run on either.
pub trait FieldLookup {
    fn value(&self, name: &str) -> Option<FieldValue>;

    fn number(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(|v| v.as_f64())
    }
}

impl FieldLookup for BTreeMap<String, FieldValue> {
    fn value(&self, name: &str) -> Option<FieldValue> {
        self.get(name).cloned()
    }
}

/// One `(column name, value)` cell of a model row.
pub type Column = (&'static str, FieldValue);

/// A closed set of literal category strings.
pub trait Choice: Sized + Copy {
    const CHOICES: &'static [&'static str];

    fn parse(s: &str) -> Option<Self>;

    fn as_str(&self) -> &'static str;
}

macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl Choice for $name {
            const CHOICES: &'static [&'static str] = &[$($text),+];

            fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }

            fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }
    };
}

choice_enum!(
    /// Ten-year age bracket, spelled as half-open intervals.
    AgeGroup {
        Under10 => "[0-10)",
        Tens => "[10-20)",
        Twenties => "[20-30)",
        Thirties => "[30-40)",
        Forties => "[40-50)",
        Fifties => "[50-60)",
        Sixties => "[60-70)",
        Seventies => "[70-80)",
        Eighties => "[80-90)",
        Nineties => "[90-100)",
    }
);

choice_enum!(Specialty {
    InternalMedicine => "InternalMedicine",
    Cardiology => "Cardiology",
    Surgery => "Surgery",
    Other => "Other",
    Unknown => "Unknown",
});

choice_enum!(TestResult {
    Normal => "normal",
    Abnormal => "abnormal",
    NotTested => "not tested",
});

choice_enum!(YesNo {
    Yes => "yes",
    No => "no",
});

choice_enum!(Normality {
    Normal => "normal",
    Abnormal => "abnormal",
});

choice_enum!(Presence {
    Present => "present",
    NotPresent => "not present",
});

choice_enum!(Appetite {
    Good => "good",
    Poor => "poor",
});

/// Pima diabetes row.
#[derive(Debug, Clone, PartialEq)]
pub struct DiabetesRecord {
    pub pregnancies: i64,
    pub glucose: f64,
    pub blood_pressure: f64,
    pub skin_thickness: f64,
    pub insulin: f64,
    pub bmi: f64,
    pub diabetes_pedigree_function: f64,
    pub age: i64,
}

impl DiabetesRecord {
    fn from_fields(f: &Fields) -> Result<Self, ValidationError> {
        Ok(Self {
            pregnancies: f.int("Pregnancies")?,
            glucose: f.float("Glucose")?,
            blood_pressure: f.float("BloodPressure")?,
            skin_thickness: f.float("SkinThickness")?,
            insulin: f.float("Insulin")?,
            bmi: f.float("BMI")?,
            diabetes_pedigree_function: f.float("DiabetesPedigreeFunction")?,
            age: f.int("Age")?,
        })
    }

    pub fn columns(&self) -> Vec<Column> {
        vec![
            ("Pregnancies", self.pregnancies.into()),
            ("Glucose", self.glucose.into()),
            ("BloodPressure", self.blood_pressure.into()),
            ("SkinThickness", self.skin_thickness.into()),
            ("Insulin", self.insulin.into()),
            ("BMI", self.bmi.into()),
            ("DiabetesPedigreeFunction", self.diabetes_pedigree_function.into()),
            ("Age", self.age.into()),
        ]
    }
}

/// Diabetic inpatient encounter row.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadmissionRecord {
    pub age: AgeGroup,
    pub time_in_hospital: i64,
    pub n_lab_procedures: i64,
    pub n_procedures: i64,
    pub n_medications: i64,
    pub n_outpatient: i64,
    pub n_inpatient: i64,
    pub n_emergency: i64,
    pub medical_specialty: Specialty,
    pub diag_1: String,
    pub diag_2: String,
    pub diag_3: String,
    pub glucose_test: TestResult,
    pub a1c_test: TestResult,
    pub change: YesNo,
    pub diabetes_med: YesNo,
}

impl ReadmissionRecord {
    fn from_fields(f: &Fields) -> Result<Self, ValidationError> {
        Ok(Self {
            age: f.choice("age")?,
            time_in_hospital: f.int("time_in_hospital")?,
            n_lab_procedures: f.int("n_lab_procedures")?,
            n_procedures: f.int("n_procedures")?,
            n_medications: f.int("n_medications")?,
            n_outpatient: f.int("n_outpatient")?,
            n_inpatient: f.int("n_inpatient")?,
            n_emergency: f.int("n_emergency")?,
            medical_specialty: f.choice("medical_specialty")?,
            diag_1: f.text("diag_1")?,
            diag_2: f.text("diag_2")?,
            diag_3: f.text("diag_3")?,
            glucose_test: f.choice("glucose_test")?,
            a1c_test: f.choice("A1Ctest")?,
            change: f.choice("change")?,
            diabetes_med: f.choice("diabetes_med")?,
        })
    }

    pub fn columns(&self) -> Vec<Column> {
        vec![
            ("age", self.age.as_str().into()),
            ("time_in_hospital", self.time_in_hospital.into()),
            ("n_lab_procedures", self.n_lab_procedures.into()),
            ("n_procedures", self.n_procedures.into()),
            ("n_medications", self.n_medications.into()),
            ("n_outpatient", self.n_outpatient.into()),
            ("n_inpatient", self.n_inpatient.into()),
            ("n_emergency", self.n_emergency.into()),
            ("medical_specialty", self.medical_specialty.as_str().into()),
            ("diag_1", self.diag_1.as_str().into()),
            ("diag_2", self.diag_2.as_str().into()),
            ("diag_3", self.diag_3.as_str().into()),
            ("glucose_test", self.glucose_test.as_str().into()),
            ("A1Ctest", self.a1c_test.as_str().into()),
            ("change", self.change.as_str().into()),
            ("diabetes_med", self.diabetes_med.as_str().into()),
        ]
    }
}

/// Chronic kidney disease row.
#[derive(Debug, Clone, PartialEq)]
pub struct KidneyRecord {
    pub age: i64,
    pub blood_pressure: f64,
    pub specific_gravity: f64,
    pub albumin: f64,
    pub sugar: f64,
    pub red_blood_cells: Normality,
    pub pus_cell: Normality,
    pub pus_cell_clumps: Presence,
    pub bacteria: Presence,
    pub blood_glucose_random: f64,
    pub blood_urea: f64,
    pub serum_creatinine: f64,
    pub sodium: f64,
    pub potassium: f64,
    pub hemoglobin: f64,
    pub packed_cell_volume: f64,
    pub white_blood_cell_count: f64,
    pub red_blood_cell_count: f64,
    pub hypertension: YesNo,
    pub diabetes_mellitus: YesNo,
    pub coronary_artery_disease: YesNo,
    pub appetite: Appetite,
    pub pedal_edema: YesNo,
    pub anemia: YesNo,
}

impl KidneyRecord {
    fn from_fields(f: &Fields) -> Result<Self, ValidationError> {
        Ok(Self {
            age: f.int("Age")?,
            blood_pressure: f.float("Blood_Pressure")?,
            specific_gravity: f.float("Specific_Gravity")?,
            albumin: f.float("Albumin")?,
            sugar: f.float("Sugar")?,
            red_blood_cells: f.choice("Red_Blood_Cells")?,
            pus_cell: f.choice("Pus_Cell")?,
            pus_cell_clumps: f.choice("Pus_Cell_Clumps")?,
            bacteria: f.choice("Bacteria")?,
            blood_glucose_random: f.float("Blood_Glucose_Random")?,
            blood_urea: f.float("Blood_Urea")?,
            serum_creatinine: f.float("Serum_Creatinine")?,
            sodium: f.float("Sodium")?,
            potassium: f.float("Potassium")?,
            hemoglobin: f.float("Hemoglobin")?,
            packed_cell_volume: f.float("Packed_Cell_Volume")?,
            white_blood_cell_count: f.float("White_Blood_Cell_Count")?,
            red_blood_cell_count: f.float("Red_Blood_Cell_Count")?,
            hypertension: f.choice("Hypertension")?,
            diabetes_mellitus: f.choice("Diabetes_Mellitus")?,
            coronary_artery_disease: f.choice("Coronary_Artery_Disease")?,
            appetite: f.choice("Appetite")?,
            pedal_edema: f.choice("Pedal_Edema")?,
            anemia: f.choice("Anemia")?,
        })
    }

    pub fn columns(&self) -> Vec<Column> {
        vec![
            ("Age", self.age.into()),
            ("Blood_Pressure", self.blood_pressure.into()),
            ("Specific_Gravity", self.specific_gravity.into()),
            ("Albumin", self.albumin.into()),
            ("Sugar", self.sugar.into()),
            ("Red_Blood_Cells", self.red_blood_cells.as_str().into()),
            ("Pus_Cell", self.pus_cell.as_str().into()),
            ("Pus_Cell_Clumps", self.pus_cell_clumps.as_str().into()),
            ("Bacteria", self.bacteria.as_str().into()),
            ("Blood_Glucose_Random", self.blood_glucose_random.into()),
            ("Blood_Urea", self.blood_urea.into()),
            ("Serum_Creatinine", self.serum_creatinine.into()),
            ("Sodium", self.sodium.into()),
            ("Potassium", self.potassium.into()),
            ("Hemoglobin", self.hemoglobin.into()),
            ("Packed_Cell_Volume", self.packed_cell_volume.into()),
            ("White_Blood_Cell_Count", self.white_blood_cell_count.into()),
            ("Red_Blood_Cell_Count", self.red_blood_cell_count.into()),
            ("Hypertension", self.hypertension.as_str().into()),
            ("Diabetes_Mellitus", self.diabetes_mellitus.as_str().into()),
            ("Coronary_Artery_Disease", self.coronary_artery_disease.as_str().into()),
            ("Appetite", self.appetite.as_str().into()),
            ("Pedal_Edema", self.pedal_edema.as_str().into()),
            ("Anemia", self.anemia.as_str().into()),
        ]
    }
}

/// The exact-shape row handed to a model artifact, tagged by dataset.
///
/// Constructed once per submission by [`build_record`] and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum InputRecord {
    Diabetes(DiabetesRecord),
    HospitalReadmission(ReadmissionRecord),
    KidneyDisease(KidneyRecord),
}

impl InputRecord {
    pub fn dataset(&self) -> DatasetKind {
        match self {
            Self::Diabetes(_) => DatasetKind::Diabetes,
            Self::HospitalReadmission(_) => DatasetKind::HospitalReadmission,
            Self::KidneyDisease(_) => DatasetKind::KidneyDisease,
        }
    }

    /// Cells in model column order.
    pub fn columns(&self) -> Vec<Column> {
        match self {
            Self::Diabetes(r) => r.columns(),
            Self::HospitalReadmission(r) => r.columns(),
            Self::KidneyDisease(r) => r.columns(),
        }
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns().into_iter().map(|(name, _)| name).collect()
    }
}

impl FieldLookup for InputRecord {
    fn value(&self, name: &str) -> Option<FieldValue> {
        self.columns()
            .into_iter()
            .find(|(column, _)| *column == name)
            .map(|(_, value)| value)
    }
}

/// Check a raw value map against the dataset's field set.
///
/// The key set must equal the schema's field names exactly, and every value
/// must type-check against its field. Returns the values in their field's
/// own representation (e.g. integers widened for continuous fields).
pub fn normalize_values(
    dataset: DatasetKind,
    values: &BTreeMap<String, FieldValue>,
) -> Result<BTreeMap<String, FieldValue>, ValidationError> {
    let schema = dataset.schema();

    if let Some(extra) = values.keys().find(|k| schema.field(k).is_none()) {
        return Err(ValidationError::UnexpectedField {
            dataset,
            name: extra.clone(),
        });
    }

    let mut normalized = BTreeMap::new();
    for spec in schema.fields {
        let value = values
            .get(spec.name)
            .ok_or_else(|| ValidationError::MissingField {
                dataset,
                name: spec.name.to_string(),
            })?;
        normalized.insert(spec.name.to_string(), spec.check(value)?);
    }
    Ok(normalized)
}

/// Build the typed record for `dataset` from one value per field.
pub fn build_record(
    dataset: DatasetKind,
    values: &BTreeMap<String, FieldValue>,
) -> Result<InputRecord, ValidationError> {
    let fields = Fields {
        dataset,
        values: normalize_values(dataset, values)?,
    };
    Ok(match dataset {
        DatasetKind::Diabetes => InputRecord::Diabetes(DiabetesRecord::from_fields(&fields)?),
        DatasetKind::HospitalReadmission => {
            InputRecord::HospitalReadmission(ReadmissionRecord::from_fields(&fields)?)
        }
        DatasetKind::KidneyDisease => {
            InputRecord::KidneyDisease(KidneyRecord::from_fields(&fields)?)
        }
    })
}

/// Normalized values with typed getters.
struct Fields {
    dataset: DatasetKind,
    values: BTreeMap<String, FieldValue>,
}

impl Fields {
    fn get(&self, name: &str) -> Result<&FieldValue, ValidationError> {
        self.values
            .get(name)
            .ok_or_else(|| ValidationError::MissingField {
                dataset: self.dataset,
                name: name.to_string(),
            })
    }

    fn wrong_type(name: &str, expected: &'static str, value: &FieldValue) -> ValidationError {
        ValidationError::WrongType {
            name: name.to_string(),
            expected,
            value: value.to_string(),
        }
    }

    fn float(&self, name: &str) -> Result<f64, ValidationError> {
        let value = self.get(name)?;
        value
            .as_f64()
            .ok_or_else(|| Self::wrong_type(name, "a number", value))
    }

    fn int(&self, name: &str) -> Result<i64, ValidationError> {
        match self.get(name)? {
            FieldValue::Integer(i) => Ok(*i),
            other => Err(Self::wrong_type(name, "a whole number", other)),
        }
    }

    fn text(&self, name: &str) -> Result<String, ValidationError> {
        match self.get(name)? {
            FieldValue::Text(s) => Ok(s.clone()),
            other => Err(Self::wrong_type(name, "text", other)),
        }
    }

    fn choice<C: Choice>(&self, name: &str) -> Result<C, ValidationError> {
        let value = self.get(name)?;
        value
            .as_str()
            .and_then(C::parse)
            .ok_or_else(|| ValidationError::UnknownChoice {
                name: name.to_string(),
                value: value.to_string(),
                allowed: C::CHOICES.join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn defaults(dataset: DatasetKind) -> BTreeMap<String, FieldValue> {
        dataset
            .schema()
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.default_value()))
            .collect()
    }

    #[test]
    fn test_columns_follow_registry_order() {
        for dataset in DatasetKind::ALL {
            let record = build_record(dataset, &defaults(dataset)).unwrap();
            let expected: Vec<_> = dataset.schema().field_names().collect();
            assert_eq!(record.column_names(), expected);
            assert_eq!(record.dataset(), dataset);
        }
    }

    #[test]
    fn test_build_diabetes_record() {
        let mut values = defaults(DatasetKind::Diabetes);
        values.insert("Glucose".into(), 150.into());
        values.insert("BMI".into(), 28.5.into());

        let record = build_record(DatasetKind::Diabetes, &values).unwrap();
        let InputRecord::Diabetes(r) = &record else {
            panic!("expected diabetes record");
        };
        assert_eq!(r.glucose, 150.0);
        assert_eq!(r.bmi, 28.5);
        assert_eq!(record.number("Glucose"), Some(150.0));
        assert_eq!(record.value("Age"), Some(FieldValue::Integer(30)));
    }

    #[test]
    fn test_build_rejects_missing_and_extra() {
        let mut values = defaults(DatasetKind::KidneyDisease);
        values.remove("Blood_Urea");
        assert_eq!(
            build_record(DatasetKind::KidneyDisease, &values),
            Err(ValidationError::MissingField {
                dataset: DatasetKind::KidneyDisease,
                name: "Blood_Urea".into(),
            })
        );

        let mut values = defaults(DatasetKind::KidneyDisease);
        values.insert("blood_urea".into(), 30.0.into());
        assert!(matches!(
            build_record(DatasetKind::KidneyDisease, &values),
            Err(ValidationError::UnexpectedField { name, .. }) if name == "blood_urea"
        ));
    }

    #[test]
    fn test_build_rejects_cross_dataset_spelling() {
        // Kidney spells it Blood_Pressure; diabetes spells it BloodPressure.
        let mut values = defaults(DatasetKind::Diabetes);
        let bp = values.remove("BloodPressure").unwrap();
        values.insert("Blood_Pressure".into(), bp);
        assert!(build_record(DatasetKind::Diabetes, &values).is_err());
    }

    #[test]
    fn test_build_rejects_bad_choice() {
        let mut values = defaults(DatasetKind::HospitalReadmission);
        values.insert("A1Ctest".into(), "high".into());
        assert!(matches!(
            build_record(DatasetKind::HospitalReadmission, &values),
            Err(ValidationError::UnknownChoice { .. })
        ));
    }

    #[test]
    fn test_categorical_values_pass_through_literally() {
        let mut values = defaults(DatasetKind::HospitalReadmission);
        values.insert("glucose_test".into(), "not tested".into());
        values.insert("age".into(), "[70-80)".into());
        let record = build_record(DatasetKind::HospitalReadmission, &values).unwrap();
        assert_eq!(record.value("glucose_test"), Some("not tested".into()));
        assert_eq!(record.value("age"), Some("[70-80)".into()));
    }

    #[test]
    fn test_choice_parse() {
        assert_eq!(Presence::parse("not present"), Some(Presence::NotPresent));
        assert_eq!(Presence::parse("Not Present"), None);
        assert_eq!(AgeGroup::Nineties.as_str(), "[90-100)");
        assert_eq!(AgeGroup::CHOICES.len(), 10);
    }

    #[test]
    fn test_field_value_serde() {
        let values: Vec<FieldValue> = serde_json::from_str(r#"[3, 2.5, "yes"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                FieldValue::Integer(3),
                FieldValue::Float(2.5),
                FieldValue::Text("yes".into())
            ]
        );
    }
}
