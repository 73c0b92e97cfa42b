//! # Healthpredict Core
//!
//! Core library for the health prediction form. Provides the schema
//! registry for the three datasets, the typed record builder, the
//! prediction adapter, the per-submission pipeline, layered configuration,
//! and the HTTP form surface.

pub mod artifact;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod predict;
pub mod record;
pub mod schema;
pub mod web;

// Re-export commonly used types at the crate root.
pub use artifact::{ArtifactLoader, LoadedModel, ModelSlot};
pub use config::{AppConfig, ConfigOverrides, ModelsConfig, PythonConfig, ServerConfig};
pub use error::{ConfigurationError, HealthError, PredictionError, ValidationError};
pub use pipeline::{Submission, SubmissionOutcome, SubmissionState, submit};
pub use predict::{Classifier, Outcome, PredictionResult, Tone, predict};
pub use record::{Column, FieldValue, InputRecord, build_record};
pub use schema::{DatasetKind, DatasetSchema, FieldKind, FieldSpec, ValidationRule, Verdict};

/// Convenience result alias for the core library.
pub type Result<T> = std::result::Result<T, HealthError>;
