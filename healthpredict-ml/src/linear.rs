//! Native logistic-regression artifact.
//!
//! ```json
//! {
//!   "format": "logistic",
//!   "intercept": -8.4,
//!   "threshold": 0.5,
//!   "columns": [
//!     { "kind": "numeric", "name": "Glucose", "weight": 0.035, "mean": 120.9, "scale": 31.9 },
//!     { "kind": "categorical", "name": "change", "levels": { "yes": 0.12, "no": 0.0 } }
//!   ]
//! }
//! ```

use crate::columns::{align, category, numeric, unknown_category};
use crate::error::MlError;
use healthpredict_core::{Classifier, InputRecord, PredictionError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One input column and its contribution to the linear score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinearColumn {
    /// Contributes `weight * (x - mean) / scale`.
    Numeric {
        name: String,
        weight: f64,
        #[serde(default)]
        mean: f64,
        #[serde(default = "default_scale")]
        scale: f64,
    },
    /// Contributes the weight of the entered level.
    Categorical {
        name: String,
        levels: BTreeMap<String, f64>,
    },
}

impl LinearColumn {
    pub fn name(&self) -> &str {
        match self {
            Self::Numeric { name, .. } | Self::Categorical { name, .. } => name,
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

fn default_threshold() -> f64 {
    0.5
}

/// Fitted logistic model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    pub columns: Vec<LinearColumn>,
}

impl LogisticModel {
    pub fn validate(&self) -> Result<(), MlError> {
        if self.columns.is_empty() {
            return Err(MlError::model("logistic model has no columns"));
        }
        if !self.intercept.is_finite() {
            return Err(MlError::model("intercept must be finite"));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(MlError::model(format!(
                "threshold {} is outside (0, 1]",
                self.threshold
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name()) {
                return Err(MlError::model(format!(
                    "column '{}' is listed twice",
                    column.name()
                )));
            }
            match column {
                LinearColumn::Numeric {
                    name,
                    weight,
                    mean,
                    scale,
                } => {
                    if !(weight.is_finite() && mean.is_finite() && scale.is_finite()) {
                        return Err(MlError::model(format!(
                            "column '{name}' has a non-finite coefficient"
                        )));
                    }
                    if *scale == 0.0 {
                        return Err(MlError::model(format!("column '{name}' has zero scale")));
                    }
                }
                LinearColumn::Categorical { name, levels } => {
                    if levels.is_empty() {
                        return Err(MlError::model(format!("column '{name}' has no levels")));
                    }
                    if levels.values().any(|w| !w.is_finite()) {
                        return Err(MlError::model(format!(
                            "column '{name}' has a non-finite level weight"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Probability of the positive class.
    pub fn probability(&self, record: &InputRecord) -> Result<f64, PredictionError> {
        let values = align(self.columns.iter().map(LinearColumn::name), record)?;
        let mut z = self.intercept;
        for (column, value) in self.columns.iter().zip(&values) {
            z += match column {
                LinearColumn::Numeric {
                    name,
                    weight,
                    mean,
                    scale,
                } => weight * (numeric(name, value)? - mean) / scale,
                LinearColumn::Categorical { name, levels } => {
                    let level = category(name, value)?;
                    *levels
                        .get(level)
                        .ok_or_else(|| unknown_category(name, level))?
                }
            };
        }
        Ok(sigmoid(z))
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// [`Classifier`] over a [`LogisticModel`].
#[derive(Debug)]
pub struct LogisticArtifact {
    name: String,
    model: LogisticModel,
}

impl LogisticArtifact {
    pub fn new(name: impl Into<String>, model: LogisticModel) -> Result<Self, MlError> {
        model.validate()?;
        Ok(Self {
            name: name.into(),
            model,
        })
    }

    pub fn model(&self) -> &LogisticModel {
        &self.model
    }
}

impl Classifier for LogisticArtifact {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, record: &InputRecord) -> Result<i64, PredictionError> {
        let p = self.model.probability(record)?;
        Ok(i64::from(p >= self.model.threshold))
    }

    fn score_distribution(&self, record: &InputRecord) -> Result<Vec<f64>, PredictionError> {
        let p = self.model.probability(record)?;
        Ok(vec![1.0 - p, p])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthpredict_core::record::build_record;
    use healthpredict_core::{DatasetKind, FieldValue};

    fn record(dataset: DatasetKind, overrides: &[(&str, FieldValue)]) -> InputRecord {
        let mut values: BTreeMap<String, FieldValue> = dataset
            .schema()
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.default_value()))
            .collect();
        for (name, value) in overrides {
            values.insert(name.to_string(), value.clone());
        }
        build_record(dataset, &values).unwrap()
    }

    fn diabetes_model(intercept: f64) -> LogisticModel {
        let names = [
            "Pregnancies",
            "Glucose",
            "BloodPressure",
            "SkinThickness",
            "Insulin",
            "BMI",
            "DiabetesPedigreeFunction",
            "Age",
        ];
        LogisticModel {
            intercept,
            threshold: 0.5,
            columns: names
                .iter()
                .map(|name| LinearColumn::Numeric {
                    name: name.to_string(),
                    weight: if *name == "Glucose" { 1.0 } else { 0.0 },
                    mean: if *name == "Glucose" { 100.0 } else { 0.0 },
                    scale: if *name == "Glucose" { 50.0 } else { 1.0 },
                })
                .collect(),
        }
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(800.0) <= 1.0);
    }

    #[test]
    fn test_probability_and_label() {
        let artifact = LogisticArtifact::new("diabetes.json", diabetes_model(0.0)).unwrap();

        // Glucose at the mean: z = 0.
        let at_mean = record(DatasetKind::Diabetes, &[("Glucose", FieldValue::Float(100.0))]);
        assert_eq!(artifact.score_distribution(&at_mean).unwrap(), vec![0.5, 0.5]);
        assert_eq!(artifact.classify(&at_mean).unwrap(), 1);

        // Two scales below the mean.
        let low = record(DatasetKind::Diabetes, &[("Glucose", FieldValue::Float(0.0))]);
        let dist = artifact.score_distribution(&low).unwrap();
        assert!((dist[1] - sigmoid(-2.0)).abs() < 1e-12);
        assert_eq!(artifact.classify(&low).unwrap(), 0);
    }

    #[test]
    fn test_categorical_levels() {
        let model: LogisticModel = serde_json::from_value(serde_json::json!({
            "intercept": 0.0,
            "columns": [
                { "kind": "categorical", "name": "Hypertension", "levels": { "yes": 2.0, "no": -2.0 } }
            ]
        }))
        .unwrap();
        assert_eq!(model.threshold, 0.5);
        let artifact = LogisticArtifact::new("kidney.json", model).unwrap();

        let kidney = record(DatasetKind::KidneyDisease, &[]);
        // The kidney record has 24 columns; this model knows only one.
        assert!(matches!(
            artifact.classify(&kidney).unwrap_err(),
            PredictionError::UnexpectedColumn { .. }
        ));
    }

    #[test]
    fn test_unknown_level() {
        let mut model = diabetes_model(0.0);
        model.columns[0] = LinearColumn::Categorical {
            name: "Pregnancies".into(),
            levels: BTreeMap::from([("many".to_string(), 1.0)]),
        };
        let artifact = LogisticArtifact::new("diabetes.json", model).unwrap();
        let err = artifact
            .classify(&record(DatasetKind::Diabetes, &[]))
            .unwrap_err();
        assert_eq!(
            err,
            PredictionError::ColumnType {
                column: "Pregnancies".into(),
                expected: "a category"
            }
        );
    }

    #[test]
    fn test_validation() {
        let mut model = diabetes_model(0.0);
        model.threshold = 0.0;
        assert!(model.validate().is_err());

        let mut model = diabetes_model(0.0);
        model.columns.push(model.columns[0].clone());
        assert!(model.validate().is_err());

        let mut model = diabetes_model(0.0);
        model.columns[1] = LinearColumn::Numeric {
            name: "Glucose".into(),
            weight: 1.0,
            mean: 0.0,
            scale: 0.0,
        };
        assert!(model.validate().is_err());
    }
}
