//! Error types for the healthpredict-ml crate.

use healthpredict_core::PredictionError;
use thiserror::Error;

/// Failures inside an artifact adapter.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Python runtime error: {0}")]
    Python(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl MlError {
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn python(msg: impl Into<String>) -> Self {
        Self::Python(msg.into())
    }
}

/// Adapter failures during scoring reach the pipeline as invocation errors.
impl From<MlError> for PredictionError {
    fn from(err: MlError) -> Self {
        match err {
            // Exceptions raised by the model itself are shown verbatim.
            MlError::Inference(message) => PredictionError::invocation(message),
            other => PredictionError::invocation(other.to_string()),
        }
    }
}
