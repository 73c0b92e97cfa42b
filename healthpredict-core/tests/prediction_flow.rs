//! End-to-end submission scenarios against stub classifiers.

use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use healthpredict_core::{
    Classifier, DatasetKind, FieldKind, FieldValue, InputRecord, PredictionError,
    SubmissionOutcome, SubmissionState, Submission, Tone, submit,
};

/// Returns a fixed answer and counts how often it was asked.
struct CountingClassifier {
    label: i64,
    distribution: Vec<f64>,
    classify_calls: AtomicUsize,
    score_calls: AtomicUsize,
}

impl CountingClassifier {
    fn new(label: i64, distribution: Vec<f64>) -> Self {
        Self {
            label,
            distribution,
            classify_calls: AtomicUsize::new(0),
            score_calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> (usize, usize) {
        (
            self.classify_calls.load(Ordering::SeqCst),
            self.score_calls.load(Ordering::SeqCst),
        )
    }
}

impl Classifier for CountingClassifier {
    fn name(&self) -> &str {
        "counting"
    }

    fn classify(&self, _record: &InputRecord) -> Result<i64, PredictionError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.label)
    }

    fn score_distribution(&self, _record: &InputRecord) -> Result<Vec<f64>, PredictionError> {
        self.score_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.distribution.clone())
    }
}

struct Broken;

impl Classifier for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn classify(&self, _record: &InputRecord) -> Result<i64, PredictionError> {
        Ok(0)
    }

    fn score_distribution(&self, _record: &InputRecord) -> Result<Vec<f64>, PredictionError> {
        Err(PredictionError::invocation("predict_proba is not available"))
    }
}

fn defaults(dataset: DatasetKind) -> BTreeMap<String, FieldValue> {
    dataset
        .schema()
        .fields
        .iter()
        .map(|f| (f.name.to_string(), f.default_value()))
        .collect()
}

fn diabetes_values() -> BTreeMap<String, FieldValue> {
    let mut values = BTreeMap::new();
    values.insert("Pregnancies".to_string(), FieldValue::Integer(2));
    values.insert("Glucose".to_string(), FieldValue::Float(150.0));
    values.insert("BloodPressure".to_string(), FieldValue::Float(80.0));
    values.insert("SkinThickness".to_string(), FieldValue::Float(30.0));
    values.insert("Insulin".to_string(), FieldValue::Float(100.0));
    values.insert("BMI".to_string(), FieldValue::Float(28.5));
    values.insert("DiabetesPedigreeFunction".to_string(), FieldValue::Float(0.6));
    values.insert("Age".to_string(), FieldValue::Integer(45));
    values
}

#[test]
fn test_diabetes_positive_result() {
    let classifier = CountingClassifier::new(1, vec![0.2, 0.8]);
    let outcome = submit(DatasetKind::Diabetes, &diabetes_values(), &classifier);

    let SubmissionOutcome::Succeeded(result) = &outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(result.label(), 1);
    assert_eq!(result.outcome().message, "Diabetes Risk Detected");
    assert_eq!(result.outcome().tone, Tone::Warning);
    assert_eq!(result.confidence_display(), "80.00%");
    assert_eq!(classifier.calls(), (1, 1));
}

#[test]
fn test_diabetes_zero_bmi_is_rejected_without_scoring() {
    let classifier = CountingClassifier::new(1, vec![0.2, 0.8]);
    let mut values = diabetes_values();
    values.insert("BMI".to_string(), FieldValue::Float(0.0));

    let outcome = submit(DatasetKind::Diabetes, &values, &classifier);
    assert_eq!(
        outcome,
        SubmissionOutcome::Rejected {
            message: "Please enter valid values (Glucose and BMI cannot be 0).".to_string()
        }
    );
    assert_eq!(classifier.calls(), (0, 0));
}

#[test]
fn test_kidney_zero_glucose_is_rejected_without_scoring() {
    let classifier = CountingClassifier::new(0, vec![0.9, 0.1]);
    let mut values = defaults(DatasetKind::KidneyDisease);
    values.insert("Blood_Glucose_Random".to_string(), FieldValue::Float(0.0));

    let mut submission = Submission::new(DatasetKind::KidneyDisease);
    let outcome = submission.run(&values, &classifier);
    assert_eq!(
        outcome,
        SubmissionOutcome::Rejected {
            message: "Please enter valid values (Blood Glucose and Serum Creatinine cannot be 0)."
                .to_string()
        }
    );
    assert_eq!(submission.state(), SubmissionState::Rejected);
    assert_eq!(classifier.calls(), (0, 0));
}

#[test]
fn test_kidney_zero_creatinine_is_rejected_without_scoring() {
    let classifier = CountingClassifier::new(0, vec![0.9, 0.1]);
    let mut values = defaults(DatasetKind::KidneyDisease);
    values.insert("Blood_Glucose_Random".to_string(), FieldValue::Float(100.0));
    values.insert("Serum_Creatinine".to_string(), FieldValue::Float(0.0));

    let outcome = submit(DatasetKind::KidneyDisease, &values, &classifier);
    assert_eq!(
        outcome,
        SubmissionOutcome::Rejected {
            message: "Please enter valid values (Blood Glucose and Serum Creatinine cannot be 0)."
                .to_string()
        }
    );
    assert_eq!(classifier.calls(), (0, 0));
}

#[test]
fn test_kidney_nonzero_glucose_and_creatinine_are_scored() {
    let classifier = CountingClassifier::new(1, vec![0.3, 0.7]);
    let mut values = defaults(DatasetKind::KidneyDisease);
    values.insert("Blood_Glucose_Random".to_string(), FieldValue::Float(100.0));
    values.insert("Serum_Creatinine".to_string(), FieldValue::Float(1.0));

    let outcome = submit(DatasetKind::KidneyDisease, &values, &classifier);
    assert_eq!(outcome.state(), SubmissionState::Succeeded);
    assert_eq!(classifier.calls(), (1, 1));
}

#[test]
fn test_kidney_negative_result() {
    let classifier = CountingClassifier::new(0, vec![0.9, 0.1]);
    let outcome = submit(
        DatasetKind::KidneyDisease,
        &defaults(DatasetKind::KidneyDisease),
        &classifier,
    );
    let SubmissionOutcome::Succeeded(result) = &outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(result.outcome().message, "No Kidney Disease Risk");
    assert_eq!(result.outcome().tone, Tone::Success);
    assert_eq!(result.confidence_display(), "90.00%");
}

#[test]
fn test_hospital_lowest_values_are_accepted() {
    let classifier = CountingClassifier::new(0, vec![0.6, 0.4]);
    let mut values = defaults(DatasetKind::HospitalReadmission);
    for spec in DatasetKind::HospitalReadmission.schema().fields {
        if let FieldKind::Integer { min, .. } = spec.kind {
            values.insert(spec.name.to_string(), FieldValue::Integer(min));
        }
    }

    let outcome = submit(DatasetKind::HospitalReadmission, &values, &classifier);
    let SubmissionOutcome::Succeeded(result) = &outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(result.outcome().message, "Hospital Readmission Unlikely");
    assert_eq!(result.confidence_display(), "60.00%");
    assert_eq!(classifier.calls(), (1, 1));
}

#[test]
fn test_hospital_all_zero_numbers_are_accepted() {
    let classifier = CountingClassifier::new(1, vec![0.45, 0.55]);
    let mut values = defaults(DatasetKind::HospitalReadmission);
    for spec in DatasetKind::HospitalReadmission.schema().fields {
        match spec.kind {
            FieldKind::Integer { .. } => {
                values.insert(spec.name.to_string(), FieldValue::Integer(0));
            }
            FieldKind::Continuous { .. } => {
                values.insert(spec.name.to_string(), FieldValue::Float(0.0));
            }
            _ => {}
        }
    }

    let outcome = submit(DatasetKind::HospitalReadmission, &values, &classifier);
    let SubmissionOutcome::Succeeded(result) = &outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(result.outcome().message, "Hospital Readmission Likely");
    assert_eq!(result.confidence_display(), "55.00%");
    assert_eq!(classifier.calls(), (1, 1));
}

#[test]
fn test_missing_field_is_rejected() {
    let classifier = CountingClassifier::new(1, vec![0.2, 0.8]);
    let mut values = diabetes_values();
    values.remove("Insulin");

    let outcome = submit(DatasetKind::Diabetes, &values, &classifier);
    assert_eq!(outcome.state(), SubmissionState::Rejected);
    assert_eq!(classifier.calls(), (0, 0));
}

#[test]
fn test_artifact_failure_surfaces_message() {
    let outcome = submit(DatasetKind::Diabetes, &diabetes_values(), &Broken);
    assert_eq!(
        outcome,
        SubmissionOutcome::Failed {
            message: "Prediction failed: predict_proba is not available".to_string()
        }
    );
}

#[test]
fn test_out_of_range_label_fails() {
    let classifier = CountingClassifier::new(2, vec![0.1, 0.2, 0.7]);
    let outcome = submit(DatasetKind::Diabetes, &diabetes_values(), &classifier);
    assert_eq!(outcome.state(), SubmissionState::Failed);
}

#[test]
fn test_each_submission_starts_from_idle() {
    let classifier = CountingClassifier::new(1, vec![0.3, 0.7]);
    for _ in 0..3 {
        let mut submission = Submission::new(DatasetKind::Diabetes);
        assert_eq!(submission.state(), SubmissionState::Idle);
        submission.run(&diabetes_values(), &classifier);
        assert_eq!(submission.state(), SubmissionState::Succeeded);
    }
    assert_eq!(classifier.calls(), (3, 3));
}
