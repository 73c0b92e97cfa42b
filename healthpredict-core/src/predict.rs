//! Prediction adapter.
//!
//! A trained artifact is reached only through the narrow [`Classifier`]
//! capability. [`predict`] invokes both of its operations on a built record
//! and normalizes the answer into a label plus a confidence percentage.

use crate::error::PredictionError;
use crate::record::InputRecord;
use crate::schema::DatasetKind;
use serde::Serialize;
use tracing::debug;

/// Scoring capability of a loaded model artifact.
///
/// Implementations must treat scoring as read-only: the same artifact is
/// shared across every submission for its dataset.
pub trait Classifier: Send + Sync {
    /// Identifier used in logs, e.g. the artifact format and file name.
    fn name(&self) -> &str;

    /// Discrete class label for the record.
    fn classify(&self, record: &InputRecord) -> Result<i64, PredictionError>;

    /// Probability per class, indexed by class label.
    fn score_distribution(&self, record: &InputRecord) -> Result<Vec<f64>, PredictionError>;
}

/// Severity of a result message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Warning,
    Success,
}

impl Tone {
    /// Marker shown before a result message.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Warning => "⚠️",
            Self::Success => "✅",
        }
    }
}

/// Human-readable interpretation of one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub message: &'static str,
    pub tone: Tone,
}

/// Per-dataset message table: label 1 is positive risk, label 0 negative.
#[derive(Debug, Clone, Copy)]
pub struct Outcomes {
    pub positive: Outcome,
    pub negative: Outcome,
}

impl Outcomes {
    /// Message for a normalized label; anything but 1 reads as negative.
    pub fn for_label(&self, label: u8) -> &Outcome {
        if label == 1 {
            &self.positive
        } else {
            &self.negative
        }
    }
}

/// Tolerance for probabilities that drift just outside `[0, 1]`.
const PROBABILITY_EPSILON: f64 = 1e-9;

/// Maximum class probability as a percentage in `[0, 100]`.
pub fn confidence_percentage(distribution: &[f64]) -> Result<f64, PredictionError> {
    if distribution.is_empty() {
        return Err(PredictionError::distribution("no class probabilities"));
    }
    if let Some(p) = distribution.iter().find(|p| {
        !p.is_finite() || **p < -PROBABILITY_EPSILON || **p > 1.0 + PROBABILITY_EPSILON
    }) {
        return Err(PredictionError::distribution(format!(
            "probability {p} is outside [0, 1]"
        )));
    }
    let max = distribution.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok((max * 100.0).clamp(0.0, 100.0))
}

/// Label plus confidence for one submission. Exists only for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    dataset: DatasetKind,
    label: u8,
    confidence: f64,
}

impl PredictionResult {
    pub fn dataset(&self) -> DatasetKind {
        self.dataset
    }

    /// 0 or 1.
    pub fn label(&self) -> u8 {
        self.label
    }

    /// Percentage in `[0, 100]`.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn outcome(&self) -> &'static Outcome {
        self.dataset.schema().outcomes.for_label(self.label)
    }

    /// Confidence formatted with two decimals, e.g. `80.00%`.
    pub fn confidence_display(&self) -> String {
        format!("{:.2}%", self.confidence)
    }
}

/// Invoke `classifier` on `record` and normalize the result.
pub fn predict(
    classifier: &dyn Classifier,
    record: &InputRecord,
) -> Result<PredictionResult, PredictionError> {
    let raw_label = classifier.classify(record)?;
    let label = match raw_label {
        0 => 0u8,
        1 => 1u8,
        other => return Err(PredictionError::InvalidLabel { label: other }),
    };

    let distribution = classifier.score_distribution(record)?;
    if distribution.len() <= label as usize {
        return Err(PredictionError::distribution(format!(
            "{} class probabilities cannot cover label {label}",
            distribution.len()
        )));
    }
    let confidence = confidence_percentage(&distribution)?;

    debug!(
        model = classifier.name(),
        dataset = %record.dataset(),
        label,
        confidence,
        "Scored record"
    );

    Ok(PredictionResult {
        dataset: record.dataset(),
        label,
        confidence,
    })
}
