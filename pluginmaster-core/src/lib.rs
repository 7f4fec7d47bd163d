#![doc = "pluginmaster-core: the manifest aggregation pipeline behind pluginmaster.json."]

//! Discovers per-plugin manifests, trims them to the published schema, computes the
//! derived fields and writes the master document.
//!
//! # Usage
//! Build a [`config::PipelineConfig`], pick a [`contract::DownloadCounter`] and call
//! [`pipeline::build_master`].

pub mod config;
pub mod contract;
pub mod discover;
pub mod enrich;
pub mod error;
pub mod manifest;
pub mod master;
pub mod pipeline;
pub mod project;

pub use error::{DownloadCountError, PipelineError};
