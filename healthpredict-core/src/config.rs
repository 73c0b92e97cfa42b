//! Configuration system for healthpredict.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/healthpredict/config.toml` and/or
//! `.healthpredict/config.toml` in the workspace directory.

use crate::schema::DatasetKind;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub python: PythonConfig,
}

/// HTTP form server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8501
}

/// Where the trained artifacts live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding the artifact files. Relative paths resolve against
    /// the workspace (see [`ModelsConfig::resolve_dir`]).
    #[serde(default = "default_models_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_diabetes_model")]
    pub diabetes: String,
    #[serde(default = "default_hospital_model")]
    pub hospital_readmission: String,
    #[serde(default = "default_kidney_model")]
    pub kidney_disease: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
            diabetes: default_diabetes_model(),
            hospital_readmission: default_hospital_model(),
            kidney_disease: default_kidney_model(),
        }
    }
}

impl ModelsConfig {
    /// Artifact file name configured for `dataset`.
    pub fn file_name(&self, dataset: DatasetKind) -> &str {
        match dataset {
            DatasetKind::Diabetes => &self.diabetes,
            DatasetKind::HospitalReadmission => &self.hospital_readmission,
            DatasetKind::KidneyDisease => &self.kidney_disease,
        }
    }

    pub fn artifact_path(&self, dataset: DatasetKind) -> PathBuf {
        self.dir.join(self.file_name(dataset))
    }

    /// Anchor a relative `dir` at `workspace`.
    pub fn resolve_dir(&mut self, workspace: &Path) {
        if self.dir.is_relative() {
            self.dir = workspace.join(&self.dir);
        }
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_diabetes_model() -> String {
    "diabetes-model.pkl".to_string()
}

fn default_hospital_model() -> String {
    "hospital-model.pkl".to_string()
}

fn default_kidney_model() -> String {
    "kidney-model.pkl".to_string()
}

/// Python interpreter used by the pickle bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonConfig {
    /// Python executable.
    #[serde(default = "default_python_path")]
    pub python_path: PathBuf,
    /// Virtual environment; its interpreter wins over `python_path`.
    #[serde(default)]
    pub venv_path: Option<PathBuf>,
    /// Upper bound for one bridge invocation, in seconds.
    #[serde(default = "default_python_timeout")]
    pub timeout_secs: u64,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            python_path: default_python_path(),
            venv_path: None,
            timeout_secs: default_python_timeout(),
        }
    }
}

fn default_python_path() -> PathBuf {
    PathBuf::from("python3")
}

fn default_python_timeout() -> u64 {
    60
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub models_dir: Option<PathBuf>,
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "healthpredict", "healthpredict")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".healthpredict").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (CLI flags)
/// 2. Environment variables (prefixed with `HEALTHPREDICT_`)
/// 3. Workspace-local config (`.healthpredict/config.toml`)
/// 4. User config (`~/.config/healthpredict/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<AppConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // HEALTHPREDICT_SERVER__PORT, HEALTHPREDICT_MODELS__DIR, etc.
    figment = figment.merge(Env::prefixed("HEALTHPREDICT_").split("__"));

    if let Some(host) = &overrides.host {
        figment = figment.merge(Serialized::default("server.host", host));
    }
    if let Some(port) = overrides.port {
        figment = figment.merge(Serialized::default("server.port", port));
    }
    if let Some(dir) = &overrides.models_dir {
        figment = figment.merge(Serialized::default("models.dir", dir));
    }

    figment.extract().map_err(Box::new)
}

/// Check whether any configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}
