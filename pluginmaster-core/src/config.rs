use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::manifest::{LAST_UPDATE, LAST_UPDATED};

pub const DEFAULT_ARCHIVE_NAME: &str = "latest.zip";
pub const DEFAULT_METRICS_API: &str = "https://api.github.com";

/// Everything one pipeline run needs. Built once at startup and passed down;
/// nothing below this reads the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root of the `plugins/<InternalName>/` tree.
    pub plugins_dir: PathBuf,
    /// Where the master document is written.
    pub output: PathBuf,
    #[serde(default)]
    pub source: SourceMode,
    pub download_link: DownloadLinkStrategy,
    #[serde(default)]
    pub download_count: DownloadCountMode,
    #[serde(default)]
    pub timestamp_field: TimestampField,
    /// Apply the `DownloadLinkInstall` duplication rule.
    #[serde(default = "default_true")]
    pub duplicate_download_links: bool,
    /// Run the timestamp reconciliation pass after writing.
    #[serde(default)]
    pub reconcile: bool,
    /// Upper bound on manifests enriched at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Prepended to `AssemblyVersion` to form a release tag.
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_tag_prefix() -> String {
    "v".to_string()
}

fn default_archive_name() -> String {
    DEFAULT_ARCHIVE_NAME.to_string()
}

fn default_metrics_api() -> String {
    DEFAULT_METRICS_API.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl PipelineConfig {
    pub fn trace_loaded(&self) {
        info!(
            plugins_dir = %self.plugins_dir.display(),
            output = %self.output.display(),
            source = ?self.source,
            timestamp_field = self.timestamp_field.as_str(),
            "Loaded PipelineConfig"
        );
        debug!(?self, "PipelineConfig loaded (full debug)");
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.concurrency == 0 {
            return Err(PipelineError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        match &self.download_link {
            DownloadLinkStrategy::Branch { branch, .. }
                if branch.as_deref().map_or(true, str::is_empty) =>
            {
                Err(PipelineError::Config(
                    "branch download links need a branch (set `branch` or BRANCH)".to_string(),
                ))
            }
            DownloadLinkStrategy::FixedHost { template } if !template.contains("{plugin_name}") => {
                Err(PipelineError::Config(format!(
                    "fixed_host template '{template}' has no {{plugin_name}} placeholder"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Which backing store holds each plugin's manifest. One mode per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceMode {
    /// `plugins/<name>/<name>.json`
    #[default]
    Loose,
    /// `plugins/<name>/<archive_name>` holding a `<name>.json` entry.
    Archive {
        #[serde(default = "default_archive_name")]
        archive_name: String,
    },
}

/// How `DownloadLinkInstall` is built. Fixed per deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadLinkStrategy {
    /// External host; `{plugin_name}` is replaced by the internal name.
    FixedHost { template: String },
    /// The manifest's own `RepoUrl`.
    RepoUrl,
    /// `{base_url}/{branch}/plugins/{name}/{file_name}`
    Branch {
        base_url: String,
        #[serde(default)]
        branch: Option<String>,
        #[serde(default = "default_archive_name")]
        file_name: String,
    },
    /// `{RepoUrl}/releases/download/{tag}/{asset}`
    ReleaseAsset {
        #[serde(default = "default_archive_name")]
        asset: String,
    },
}

/// Where `DownloadCount` comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DownloadCountMode {
    #[default]
    Zero,
    /// Sum of release asset downloads from a GitHub-style API.
    Github {
        owner: String,
        #[serde(default = "default_metrics_api")]
        api_base: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

/// Name of the timestamp key; it changed between schema generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampField {
    #[default]
    LastUpdate,
    LastUpdated,
}

impl TimestampField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampField::LastUpdate => LAST_UPDATE,
            TimestampField::LastUpdated => LAST_UPDATED,
        }
    }
}
