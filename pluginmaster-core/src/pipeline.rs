//! High-level pipeline: discover → project → enrich → write.
//!
//! # Responsibilities
//! - Builds the whole catalog in memory before touching the output, so a fatal
//!   manifest error leaves the previous `pluginmaster.json` in place.
//! - Enriches manifests concurrently (bounded by `concurrency`) while keeping the
//!   sorted discovery order in the output.
//! - Optionally runs the timestamp reconciliation pass after the write.
//!
//! # Error Handling
//! Only [`PipelineError`]s escape. Missing plugin directories and failed download-count
//! lookups are logged and absorbed below this level.

use std::path::PathBuf;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::contract::DownloadCounter;
use crate::discover::discover;
use crate::enrich::enrich;
use crate::error::PipelineError;
use crate::manifest::{Manifest, DOWNLOAD_COUNT};
use crate::master::{reconcile_timestamps, write_master, ReconcileReport};
use crate::project::project;

/// What a build produced.
#[derive(Debug)]
pub struct BuildReport {
    pub output: PathBuf,
    pub plugins: Vec<PluginReport>,
    pub reconciled: Option<ReconcileReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginReport {
    pub internal_name: String,
    pub download_count: u64,
}

/// Builds the catalog without writing it.
pub async fn collect(
    config: &PipelineConfig,
    counter: &dyn DownloadCounter,
) -> Result<Vec<Manifest>, PipelineError> {
    config.validate()?;
    let discovered = discover(config)?;

    stream::iter(discovered.into_iter().map(|found| async move {
        let trimmed = project(&found.manifest);
        enrich(trimmed, &found.location, config, counter).await
    }))
    .buffered(config.concurrency)
    .try_collect()
    .await
}

/// Full rebuild of the master document.
pub async fn build_master(
    config: &PipelineConfig,
    counter: &dyn DownloadCounter,
) -> Result<BuildReport, PipelineError> {
    info!(plugins_dir = %config.plugins_dir.display(), "[BUILD] Starting master build");

    let master = collect(config, counter).await.map_err(|e| {
        error!(error = %e, "[BUILD] Aborting before write");
        e
    })?;
    write_master(&config.output, &master)?;

    let reconciled = if config.reconcile {
        Some(reconcile_timestamps(config)?)
    } else {
        None
    };

    let plugins = master
        .iter()
        .filter_map(|m| {
            Some(PluginReport {
                internal_name: m.internal_name()?.to_string(),
                download_count: m.get(DOWNLOAD_COUNT).and_then(|v| v.as_u64()).unwrap_or(0),
            })
        })
        .collect::<Vec<_>>();
    info!(plugins = plugins.len(), output = %config.output.display(), "[BUILD] Master build complete");

    Ok(BuildReport {
        output: config.output.clone(),
        plugins,
        reconciled,
    })
}
