//! Error types for the manifest pipeline.
//!
//! Only [`PipelineError`] ever escapes to the caller. Download-count failures are
//! modelled separately in [`DownloadCountError`] because the enricher absorbs them.

use std::path::PathBuf;

/// Fatal errors: any of these aborts the run before the master document is written.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A manifest lacks a field the pipeline cannot do without.
    #[error("manifest for plugin '{plugin}' is missing required field '{field}'")]
    MissingField { field: String, plugin: String },

    /// Two manifests claim the same `InternalName`.
    #[error("duplicate InternalName '{name}' in {first} and {second}")]
    DuplicateInternalName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unreadable archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn missing(field: &str, plugin: impl Into<String>) -> Self {
        PipelineError::MissingField {
            field: field.to_string(),
            plugin: plugin.into(),
        }
    }
}

/// Why a download count could not be resolved. Never fatal.
#[derive(Debug, thiserror::Error)]
pub enum DownloadCountError {
    #[error("metrics endpoint {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("metrics request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("metrics response from {url} could not be decoded: {message}")]
    Decode { url: String, message: String },
}
