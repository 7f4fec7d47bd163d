//! CLI glue for pluginmaster: command parsing and orchestration.
//!
//! All pipeline logic lives in `pluginmaster-core`; this module only loads config,
//! picks a download counter and reports what happened.
//!
//! - [`Cli`] / [`Commands`] define the user-facing surface.
//! - [`run`] is the async entrypoint shared by `main()` and integration tests.
use crate::load_config::{load_config, load_reconcile_config};
use crate::metrics::counter_for;
use anyhow::Result;
use clap::{Parser, Subcommand};
use pluginmaster_core::master::reconcile_timestamps;
use pluginmaster_core::pipeline::build_master;
use std::path::PathBuf;

/// CLI for pluginmaster: build the published plugin index.
#[derive(Parser)]
#[clap(
    name = "pluginmaster",
    version,
    about = "Aggregate per-plugin manifests into pluginmaster.json"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild the master document from the plugin tree
    Build {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Refresh only the timestamps of an existing master document
    Reconcile {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Build { config } => {
            let config = load_config(config)?;
            let counter = counter_for(&config.download_count)?;
            tracing::info!(command = "build", "Starting master build");
            match build_master(&config, counter.as_ref()).await {
                Ok(report) => {
                    tracing::info!(command = "build", ?report, "Build complete");
                    println!(
                        "Wrote {} plugins to {}",
                        report.plugins.len(),
                        report.output.display()
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "build", error = %e, "Build failed");
                    Err(anyhow::Error::new(e).context("Build failed"))
                }
            }
        }
        Commands::Reconcile { config } => {
            let config = load_reconcile_config(config)?;
            tracing::info!(command = "reconcile", "Starting timestamp reconciliation");
            match reconcile_timestamps(&config) {
                Ok(report) => {
                    tracing::info!(command = "reconcile", ?report, "Reconciliation complete");
                    println!(
                        "Checked {} plugins, updated {}",
                        report.checked,
                        report.updated.len()
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "reconcile", error = %e, "Reconciliation failed");
                    Err(anyhow::Error::new(e).context("Reconciliation failed"))
                }
            }
        }
    }
}
