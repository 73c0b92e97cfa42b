//! Error types for healthpredict.
//!
//! A submission can fail in three ways, each with its own enum:
//! [`ConfigurationError`] when a model artifact cannot be acquired,
//! [`ValidationError`] when the submitted values are rejected before scoring,
//! and [`PredictionError`] when the artifact fails while scoring.

use crate::schema::DatasetKind;
use std::path::PathBuf;

/// Top-level error type for the healthpredict core library.
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Prediction error: {0}")]
    Prediction(#[from] PredictionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors acquiring the model artifact for a dataset.
///
/// Fatal for the current selection: the page stops rendering the form until
/// the environment is fixed and the page reloaded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Model file '{}' not found for {dataset}! Place it in the models directory.", .path.display())]
    ArtifactMissing { dataset: DatasetKind, path: PathBuf },

    #[error("Failed to load model '{}': {message}", .path.display())]
    ArtifactUnreadable { path: PathBuf, message: String },

    #[error("Unsupported model format: '{}'", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors raised while checking a submission before it reaches a model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown dataset: '{value}'")]
    UnknownDataset { value: String },

    #[error("Missing field '{name}' for {dataset}")]
    MissingField { dataset: DatasetKind, name: String },

    #[error("Unexpected field '{name}' for {dataset}")]
    UnexpectedField { dataset: DatasetKind, name: String },

    #[error("Field '{name}' expects {expected}, got '{value}'")]
    WrongType {
        name: String,
        expected: &'static str,
        value: String,
    },

    #[error("Field '{name}' does not accept '{value}' (allowed: {allowed})")]
    UnknownChoice {
        name: String,
        value: String,
        allowed: String,
    },

    /// A dataset rule refused the values.
    #[error("{message}")]
    Rejected { message: &'static str },
}

/// Errors raised by, or about, a model artifact invocation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictionError {
    #[error("{message}")]
    Invocation { message: String },

    #[error("Model expects column '{column}' but the record does not provide it")]
    MissingColumn { column: String },

    #[error("Record column '{column}' is not known to the model")]
    UnexpectedColumn { column: String },

    #[error("Column '{column}' has the wrong type: expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },

    #[error("Column '{column}' has unknown category '{value}'")]
    UnknownCategory { column: String, value: String },

    #[error("Model returned label {label}, expected 0 or 1")]
    InvalidLabel { label: i64 },

    #[error("Model returned an unusable probability distribution: {message}")]
    InvalidDistribution { message: String },
}

impl PredictionError {
    pub fn invocation(msg: impl Into<String>) -> Self {
        Self::Invocation {
            message: msg.into(),
        }
    }

    pub fn distribution(msg: impl Into<String>) -> Self {
        Self::InvalidDistribution {
            message: msg.into(),
        }
    }
}

impl ConfigurationError {
    pub fn unreadable(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ArtifactUnreadable {
            path: path.into(),
            message: msg.into(),
        }
    }
}
