//! File-based [`ArtifactLoader`] that dispatches on artifact format.

use crate::error::MlError;
use crate::forest::{ForestArtifact, ForestModel};
use crate::formats::{ArtifactFormat, detect_format};
use crate::linear::{LogisticArtifact, LogisticModel};
use crate::pickle::PickleArtifact;
use crate::runtime::PythonRuntime;
use healthpredict_core::{ArtifactLoader, Classifier, ConfigurationError, DatasetKind, PythonConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// A JSON artifact, tagged by its `format` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum NativeArtifact {
    Logistic(LogisticModel),
    Forest(ForestModel),
}

impl NativeArtifact {
    pub fn into_classifier(self, name: String) -> Result<Arc<dyn Classifier>, MlError> {
        Ok(match self {
            Self::Logistic(model) => Arc::new(LogisticArtifact::new(name, model)?),
            Self::Forest(model) => Arc::new(ForestArtifact::new(name, model)?),
        })
    }
}

/// Loads artifacts from disk: JSON natively, pickles through Python.
#[derive(Debug, Clone, Default)]
pub struct FileArtifactLoader {
    runtime: PythonRuntime,
}

impl FileArtifactLoader {
    pub fn new(runtime: PythonRuntime) -> Self {
        Self { runtime }
    }

    pub fn from_config(config: &PythonConfig) -> Self {
        Self::new(PythonRuntime::from_config(config))
    }

    pub fn runtime(&self) -> &PythonRuntime {
        &self.runtime
    }

    fn load_native(&self, path: &Path) -> Result<Arc<dyn Classifier>, MlError> {
        let text = std::fs::read_to_string(path)?;
        let artifact: NativeArtifact = serde_json::from_str(&text)?;
        artifact.into_classifier(format!("native:{}", path.display()))
    }

    fn load_pickle(
        &self,
        dataset: DatasetKind,
        path: &Path,
    ) -> Result<Arc<dyn Classifier>, MlError> {
        let artifact = PickleArtifact::open(path, self.runtime.clone())?;
        if let Some(features) = artifact.features() {
            let expected: Vec<&str> = dataset.schema().field_names().collect();
            if features.iter().map(String::as_str).ne(expected.iter().copied()) {
                warn!(
                    %dataset,
                    path = %path.display(),
                    ?features,
                    "Artifact was fitted on different columns than the form provides"
                );
            }
        }
        Ok(Arc::new(artifact))
    }
}

impl ArtifactLoader for FileArtifactLoader {
    fn load(
        &self,
        dataset: DatasetKind,
        path: &Path,
    ) -> Result<Arc<dyn Classifier>, ConfigurationError> {
        if !path.is_file() {
            return Err(ConfigurationError::ArtifactMissing {
                dataset,
                path: path.to_path_buf(),
            });
        }

        let format = detect_format(path);
        let loaded = match format {
            ArtifactFormat::Native => self.load_native(path),
            ArtifactFormat::Pickle => self.load_pickle(dataset, path),
            ArtifactFormat::Unknown => {
                return Err(ConfigurationError::UnsupportedFormat {
                    path: path.to_path_buf(),
                });
            }
        };

        match loaded {
            Ok(classifier) => {
                info!(%dataset, ?format, path = %path.display(), "Artifact ready");
                Ok(classifier)
            }
            Err(e) => Err(ConfigurationError::unreadable(path, e.to_string())),
        }
    }
}
