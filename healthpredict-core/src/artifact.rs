//! Model acquisition.
//!
//! The deserialization trust boundary sits behind [`ArtifactLoader`]; the
//! core only ever sees the resulting [`Classifier`]. [`ModelSlot`] holds the
//! artifact for the current dataset selection and reloads when the
//! selection changes.

use crate::config::ModelsConfig;
use crate::error::ConfigurationError;
use crate::predict::Classifier;
use crate::schema::DatasetKind;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Turns an artifact file into a [`Classifier`].
pub trait ArtifactLoader: Send + Sync {
    /// Missing files must surface as [`ConfigurationError::ArtifactMissing`],
    /// undeserializable ones as [`ConfigurationError::ArtifactUnreadable`].
    fn load(
        &self,
        dataset: DatasetKind,
        path: &Path,
    ) -> Result<Arc<dyn Classifier>, ConfigurationError>;
}

/// The artifact currently held by a [`ModelSlot`].
#[derive(Clone)]
pub struct LoadedModel {
    pub dataset: DatasetKind,
    pub path: PathBuf,
    pub classifier: Arc<dyn Classifier>,
    pub loaded_at: DateTime<Utc>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("dataset", &self.dataset)
            .field("path", &self.path)
            .field("classifier", &self.classifier.name())
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// Single-entry model holder: one loaded artifact, for the current selection.
pub struct ModelSlot {
    loader: Arc<dyn ArtifactLoader>,
    models: ModelsConfig,
    current: Option<LoadedModel>,
}

impl ModelSlot {
    pub fn new(loader: Arc<dyn ArtifactLoader>, models: ModelsConfig) -> Self {
        Self {
            loader,
            models,
            current: None,
        }
    }

    /// Artifact for `dataset`, loading it if the selection changed.
    ///
    /// A failed load leaves the slot empty, so the next request for the
    /// same dataset tries again (the equivalent of reloading the page).
    pub fn select(
        &mut self,
        dataset: DatasetKind,
    ) -> Result<Arc<dyn Classifier>, ConfigurationError> {
        if let Some(loaded) = &self.current {
            if loaded.dataset == dataset {
                return Ok(Arc::clone(&loaded.classifier));
            }
        }

        self.current = None;
        let path = self.models.artifact_path(dataset);
        match self.loader.load(dataset, &path) {
            Ok(classifier) => {
                info!(%dataset, path = %path.display(), model = classifier.name(), "Loaded model");
                self.current = Some(LoadedModel {
                    dataset,
                    path,
                    classifier: Arc::clone(&classifier),
                    loaded_at: Utc::now(),
                });
                Ok(classifier)
            }
            Err(e) => {
                error!(%dataset, error = %e, "Failed to load model");
                Err(e)
            }
        }
    }

    pub fn current(&self) -> Option<&LoadedModel> {
        self.current.as_ref()
    }

    pub fn models(&self) -> &ModelsConfig {
        &self.models
    }
}

impl std::fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSlot")
            .field("models", &self.models)
            .field("current", &self.current)
            .finish()
    }
}
