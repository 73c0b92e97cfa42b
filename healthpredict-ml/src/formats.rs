//! Artifact format detection.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported artifact formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// A pickled scikit-learn estimator, scored through the Python bridge.
    Pickle,
    /// A JSON document holding a logistic or forest model.
    Native,
    Unknown,
}

/// Detect artifact format from file extension.
pub fn detect_format(path: &Path) -> ArtifactFormat {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pkl" | "pickle" | "joblib") => ArtifactFormat::Pickle,
        Some("json") => ArtifactFormat::Native,
        _ => ArtifactFormat::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("diabetes-model.pkl")), ArtifactFormat::Pickle);
        assert_eq!(detect_format(Path::new("m/kidney.PICKLE")), ArtifactFormat::Pickle);
        assert_eq!(detect_format(Path::new("forest.joblib")), ArtifactFormat::Pickle);
        assert_eq!(detect_format(Path::new("hospital.json")), ArtifactFormat::Native);
        assert_eq!(detect_format(Path::new("model.onnx")), ArtifactFormat::Unknown);
        assert_eq!(detect_format(Path::new("model")), ArtifactFormat::Unknown);
    }
}
