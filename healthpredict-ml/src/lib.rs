//! # Healthpredict ML
//!
//! Artifact adapters behind the [`healthpredict_core::Classifier`]
//! capability: native JSON models (logistic regression and tree ensembles)
//! and a bridge that scores pickled scikit-learn estimators in a managed
//! Python subprocess.

pub mod columns;
pub mod error;
pub mod forest;
pub mod formats;
pub mod linear;
pub mod loader;
pub mod pickle;
pub mod runtime;

pub use error::MlError;
pub use forest::{ForestArtifact, ForestModel};
pub use formats::{ArtifactFormat, detect_format};
pub use linear::{LogisticArtifact, LogisticModel};
pub use loader::{FileArtifactLoader, NativeArtifact};
pub use pickle::PickleArtifact;
pub use runtime::PythonRuntime;
