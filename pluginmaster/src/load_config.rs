/// `load_config` module: loads a static YAML config and injects deployment values from
/// the environment, producing the core [`PipelineConfig`].
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into typed config (strategy and mode enums)
/// - Fill the branch of a `branch` download-link strategy from `BRANCH` when the file
///   leaves it out
/// - Validate the merged config so mistakes surface before any plugin is read
///
/// # Errors
/// All errors use `anyhow::Error` with context and are surfaced at the CLI boundary.
///
/// For the accepted YAML schema, see [`PipelineConfig`].
use anyhow::{Context, Result};
use pluginmaster_core::config::{DownloadLinkStrategy, PipelineConfig};
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Environment variable naming the branch for in-repository download links.
pub const BRANCH_ENV: &str = "BRANCH";

/// Loads the config for a full build: env injection plus full validation.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path_ref = path.as_ref();
    let mut config = read_config(path_ref)?;
    inject_env(&mut config);
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path_ref.display()))?;
    config.trace_loaded();
    Ok(config)
}

/// Loads the config for a reconciliation pass. No download link is built there,
/// so the link strategy and `BRANCH` are not checked.
pub fn load_reconcile_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let config = read_config(path.as_ref())?;
    config.trace_loaded();
    Ok(config)
}

fn read_config(path_ref: &Path) -> Result<PipelineConfig> {
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

fn inject_env(config: &mut PipelineConfig) {
    if let DownloadLinkStrategy::Branch { branch, .. } = &mut config.download_link {
        if branch.as_deref().map_or(true, str::is_empty) {
            match std::env::var(BRANCH_ENV) {
                Ok(value) if !value.is_empty() => {
                    info!(branch = %value, "Using branch from {BRANCH_ENV}");
                    *branch = Some(value);
                }
                _ => error!("{BRANCH_ENV} is not set and the config names no branch"),
            }
        }
    }
}
