//! Per-submission pipeline and its state machine.
//!
//! `Idle -> Validating -> (Rejected | Building) -> Predicting -> (Succeeded | Failed)`.
//! Every terminal state carries a user-facing message or result; the next
//! submission starts from `Idle` again. There is no retry.

use crate::error::ValidationError;
use crate::predict::{Classifier, PredictionResult, predict};
use crate::record::{FieldValue, build_record, normalize_values};
use crate::schema::{DatasetKind, Verdict};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Lifecycle of one form submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Validating,
    Rejected,
    Building,
    Predicting,
    Succeeded,
    Failed,
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Succeeded | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Rejected)
                | (Validating, Building)
                | (Building, Predicting)
                | (Building, Failed)
                | (Predicting, Succeeded)
                | (Predicting, Failed)
                | (Rejected | Succeeded | Failed, Idle)
        )
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::Building => "building",
            Self::Predicting => "predicting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What the user sees after a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// Values failed validation; nothing was scored.
    Rejected { message: String },
    Succeeded(PredictionResult),
    /// The artifact failed while scoring.
    Failed { message: String },
}

impl SubmissionOutcome {
    pub fn state(&self) -> SubmissionState {
        match self {
            Self::Rejected { .. } => SubmissionState::Rejected,
            Self::Succeeded(_) => SubmissionState::Succeeded,
            Self::Failed { .. } => SubmissionState::Failed,
        }
    }
}

/// One pass through the pipeline.
#[derive(Debug)]
pub struct Submission {
    id: Uuid,
    dataset: DatasetKind,
    state: SubmissionState,
    history: Vec<SubmissionState>,
}

impl Submission {
    pub fn new(dataset: DatasetKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            dataset,
            state: SubmissionState::Idle,
            history: vec![SubmissionState::Idle],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// States visited so far, starting with `Idle`.
    pub fn history(&self) -> &[SubmissionState] {
        &self.history
    }

    fn advance(&mut self, next: SubmissionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "Submission transition");
        self.state = next;
        self.history.push(next);
    }

    fn reject(&mut self, error: ValidationError) -> SubmissionOutcome {
        self.advance(SubmissionState::Rejected);
        let message = error.to_string();
        warn!(%message, "Submission rejected");
        SubmissionOutcome::Rejected { message }
    }

    fn fail(&mut self, message: String) -> SubmissionOutcome {
        self.advance(SubmissionState::Failed);
        error!(%message, "Submission failed");
        SubmissionOutcome::Failed { message }
    }

    /// Validate, build, and score. Runs synchronously to completion.
    pub fn run(
        &mut self,
        values: &BTreeMap<String, FieldValue>,
        classifier: &dyn Classifier,
    ) -> SubmissionOutcome {
        let span = info_span!("submission", submission_id = %self.id, dataset = %self.dataset);
        let _enter = span.enter();

        self.advance(SubmissionState::Validating);
        let values = match normalize_values(self.dataset, values) {
            Ok(values) => values,
            Err(e) => return self.reject(e),
        };
        if let Verdict::Rejected { message } = self.dataset.schema().rule.evaluate(&values) {
            return self.reject(ValidationError::Rejected { message });
        }

        self.advance(SubmissionState::Building);
        let record = match build_record(self.dataset, &values) {
            Ok(record) => record,
            Err(e) => return self.fail(format!("Could not build record: {e}")),
        };

        self.advance(SubmissionState::Predicting);
        match predict(classifier, &record) {
            Ok(result) => {
                self.advance(SubmissionState::Succeeded);
                info!(
                    label = result.label(),
                    confidence = result.confidence(),
                    "Prediction succeeded"
                );
                SubmissionOutcome::Succeeded(result)
            }
            Err(e) => self.fail(format!("Prediction failed: {e}")),
        }
    }
}

/// Run one submission for `dataset` against `classifier`.
pub fn submit(
    dataset: DatasetKind,
    values: &BTreeMap<String, FieldValue>,
    classifier: &dyn Classifier,
) -> SubmissionOutcome {
    Submission::new(dataset).run(values, classifier)
}
