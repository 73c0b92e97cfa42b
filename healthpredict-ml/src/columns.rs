//! Column contract shared by the native adapters.
//!
//! A fitted model knows the column names it was trained on; a record whose
//! names differ is refused, naming the offending column.

use healthpredict_core::{FieldValue, InputRecord, PredictionError};

/// Values of `record` in the order of `expected`.
pub fn align<'a>(
    expected: impl IntoIterator<Item = &'a str>,
    record: &InputRecord,
) -> Result<Vec<FieldValue>, PredictionError> {
    let mut columns = record.columns();
    let mut aligned = Vec::with_capacity(columns.len());

    for name in expected {
        let position = columns
            .iter()
            .position(|(column, _)| *column == name)
            .ok_or_else(|| PredictionError::MissingColumn {
                column: name.to_string(),
            })?;
        aligned.push(columns.swap_remove(position).1);
    }

    if let Some((extra, _)) = columns.first() {
        return Err(PredictionError::UnexpectedColumn {
            column: extra.to_string(),
        });
    }
    Ok(aligned)
}

pub fn numeric(column: &str, value: &FieldValue) -> Result<f64, PredictionError> {
    value.as_f64().ok_or_else(|| PredictionError::ColumnType {
        column: column.to_string(),
        expected: "a number",
    })
}

pub fn category<'v>(column: &str, value: &'v FieldValue) -> Result<&'v str, PredictionError> {
    value.as_str().ok_or_else(|| PredictionError::ColumnType {
        column: column.to_string(),
        expected: "a category",
    })
}

pub fn unknown_category(column: &str, value: &str) -> PredictionError {
    PredictionError::UnknownCategory {
        column: column.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthpredict_core::record::build_record;
    use healthpredict_core::DatasetKind;
    use std::collections::BTreeMap;

    fn diabetes() -> InputRecord {
        let values: BTreeMap<String, FieldValue> = DatasetKind::Diabetes
            .schema()
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.default_value()))
            .collect();
        build_record(DatasetKind::Diabetes, &values).unwrap()
    }

    #[test]
    fn test_align_reorders() {
        let record = diabetes();
        let mut names = record.column_names();
        names.reverse();
        let aligned = align(names.iter().copied(), &record).unwrap();
        assert_eq!(aligned.len(), 8);
        assert_eq!(aligned.last(), record.columns().first().map(|(_, v)| v));
    }

    #[test]
    fn test_align_missing_and_extra() {
        let record = diabetes();
        let mut names = record.column_names();
        names.push("Cholesterol");
        assert_eq!(
            align(names.iter().copied(), &record).unwrap_err(),
            PredictionError::MissingColumn {
                column: "Cholesterol".into()
            }
        );

        let names = ["Pregnancies", "Glucose"];
        assert!(matches!(
            align(names, &record).unwrap_err(),
            PredictionError::UnexpectedColumn { .. }
        ));
    }

    #[test]
    fn test_type_checks() {
        assert_eq!(numeric("Age", &FieldValue::Integer(3)).unwrap(), 3.0);
        assert!(numeric("Age", &FieldValue::from("3")).is_err());
        assert_eq!(category("age", &FieldValue::from("[0-10)")).unwrap(), "[0-10)");
        assert!(category("age", &FieldValue::Float(1.0)).is_err());
    }
}
