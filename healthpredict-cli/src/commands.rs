//! Subcommand handlers.

use crate::ConfigAction;
use healthpredict_core::web::{WebState, run};
use healthpredict_core::{AppConfig, ArtifactLoader, ConfigOverrides, DatasetKind, ModelSlot};
use healthpredict_ml::{ArtifactFormat, FileArtifactLoader, detect_format};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Python packages a pickled scikit-learn artifact needs at scoring time.
const BRIDGE_PACKAGES: [&str; 3] = ["pandas", "sklearn", "joblib"];

/// Layered config with the models directory anchored at `workspace`.
fn load(workspace: &Path, overrides: &ConfigOverrides) -> anyhow::Result<AppConfig> {
    let mut config = healthpredict_core::config::load_config(Some(workspace), overrides)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    config.models.resolve_dir(workspace);
    Ok(config)
}

pub async fn serve(workspace: &Path, overrides: &ConfigOverrides) -> anyhow::Result<()> {
    let config = load(workspace, overrides)?;
    if !healthpredict_core::config::config_exists(Some(workspace)) {
        info!("No configuration file found, using defaults");
    }

    let loader = FileArtifactLoader::from_config(&config.python);
    let slot = ModelSlot::new(Arc::new(loader), config.models.clone());
    let state = WebState::new(slot).map_err(|e| anyhow::anyhow!("Template error: {}", e))?;

    info!(
        models_dir = %config.models.dir.display(),
        "Serving health prediction form on http://{}:{}",
        config.server.host,
        config.server.port
    );
    run(state, &config.server.host, config.server.port).await?;
    Ok(())
}

pub async fn check(workspace: &Path, overrides: &ConfigOverrides) -> anyhow::Result<()> {
    let config = load(workspace, overrides)?;
    let loader = Arc::new(FileArtifactLoader::from_config(&config.python));

    println!("Models directory: {}", config.models.dir.display());
    let mut failures = 0;
    let mut needs_python = false;
    for dataset in DatasetKind::ALL {
        let path = config.models.artifact_path(dataset);
        needs_python |= detect_format(&path) == ArtifactFormat::Pickle;
        // Pickle artifacts block while their worker starts.
        let loaded = {
            let loader = Arc::clone(&loader);
            tokio::task::spawn_blocking(move || loader.load(dataset, &path)).await?
        };
        match loaded {
            Ok(classifier) => {
                println!("  ok    {:<22} {}", dataset.display_name(), classifier.name())
            }
            Err(e) => {
                failures += 1;
                println!("  error {:<22} {}", dataset.display_name(), e);
            }
        }
    }

    if needs_python {
        println!("Python interpreter: {}", loader.runtime().python_cmd().display());
        let packages = loader.runtime().check_packages(&BRIDGE_PACKAGES).await;
        for package in BRIDGE_PACKAGES {
            let available = packages.get(package).copied().unwrap_or(false);
            println!("  {} {}", if available { "ok     " } else { "missing" }, package);
            if !available {
                warn!(package, "Python package not importable");
            }
        }
    }

    if failures > 0 {
        anyhow::bail!(
            "{failures} of {} artifacts could not be loaded",
            DatasetKind::ALL.len()
        );
    }
    Ok(())
}

pub fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    overrides: &ConfigOverrides,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".healthpredict");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&AppConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, overrides)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
