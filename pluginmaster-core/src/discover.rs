//! Manifest source reader.
//!
//! Walks the plugin tree and loads one raw manifest per eligible directory. A
//! directory named `D` is eligible when it holds `D.json` (loose mode) or an
//! archive with a `D.json` entry (archive mode). Anything else is a plugin that
//! is not ready for publication and is skipped without complaint.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::config::{PipelineConfig, SourceMode};
use crate::contract::DiscoveredManifest;
use crate::error::PipelineError;
use crate::manifest::Manifest;

/// Where a manifest lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// The plugin's directory name. Joins the manifest to its files.
    pub plugin: String,
    pub plugin_dir: PathBuf,
    /// The file whose mtime is the plugin's last update: the loose manifest or the archive.
    pub backing_file: PathBuf,
}

impl SourceLocation {
    /// The location a plugin named `plugin` would have under `config`.
    pub fn for_plugin(config: &PipelineConfig, plugin: &str) -> Self {
        let plugin_dir = config.plugins_dir.join(plugin);
        let backing_file = backing_file(&config.source, &plugin_dir, plugin);
        Self {
            plugin: plugin.to_string(),
            plugin_dir,
            backing_file,
        }
    }

    /// Modification time of the backing file in whole seconds since the epoch.
    pub fn modified_secs(&self) -> Result<u64, PipelineError> {
        let modified = fs::metadata(&self.backing_file)
            .and_then(|meta| meta.modified())
            .map_err(|e| PipelineError::io(&self.backing_file, e))?;
        Ok(modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0))
    }
}

impl DiscoveredManifest {
    fn sort_key(&self) -> &str {
        self.manifest
            .internal_name()
            .unwrap_or(self.location.plugin.as_str())
    }
}

fn backing_file(mode: &SourceMode, plugin_dir: &Path, plugin: &str) -> PathBuf {
    match mode {
        SourceMode::Loose => plugin_dir.join(format!("{plugin}.json")),
        SourceMode::Archive { archive_name } => plugin_dir.join(archive_name),
    }
}

/// Finds and parses every eligible manifest under `config.plugins_dir`.
///
/// Results are sorted by `InternalName` (directory name when it has none) so the
/// master document diffs cleanly.
/// Fails on unreadable or malformed manifests and on duplicate `InternalName`s.
pub fn discover(config: &PipelineConfig) -> Result<Vec<DiscoveredManifest>, PipelineError> {
    let root = &config.plugins_dir;
    if !root.is_dir() {
        warn!(plugins_dir = %root.display(), "Plugin directory does not exist, catalog is empty");
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            PipelineError::io(path, e.into())
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(plugin) = entry.file_name().to_str() else {
            debug!(path = %entry.path().display(), "Skipping directory with non UTF-8 name");
            continue;
        };
        let location = SourceLocation {
            plugin: plugin.to_string(),
            plugin_dir: entry.path().to_path_buf(),
            backing_file: backing_file(&config.source, entry.path(), plugin),
        };
        if let Some(manifest) = load(&config.source, &location)? {
            found.push(DiscoveredManifest { manifest, location });
        }
    }

    found.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));
    check_unique(&found)?;
    info!(count = found.len(), plugins_dir = %root.display(), "Discovered plugin manifests");
    Ok(found)
}

/// Loads the manifest for one location, `None` when it has none.
pub fn load(mode: &SourceMode, location: &SourceLocation) -> Result<Option<Manifest>, PipelineError> {
    let text = match mode {
        SourceMode::Loose => read_loose(location)?,
        SourceMode::Archive { .. } => read_archive_entry(location)?,
    };
    let Some(text) = text else {
        debug!(plugin = %location.plugin, "No manifest found, skipping");
        return Ok(None);
    };

    let manifest = Manifest::from_json_str(&text).map_err(|source| {
        error!(plugin = %location.plugin, error = %source, "Failed to parse manifest");
        PipelineError::Json {
            path: location.backing_file.clone(),
            source,
        }
    })?;

    if let Some(name) = manifest.internal_name() {
        if name != location.plugin {
            warn!(
                plugin = %location.plugin,
                internal_name = name,
                "InternalName does not match its directory"
            );
        }
    }
    debug!(plugin = %location.plugin, path = %location.backing_file.display(), "Loaded manifest");
    Ok(Some(manifest))
}

fn read_loose(location: &SourceLocation) -> Result<Option<String>, PipelineError> {
    if !location.backing_file.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(&location.backing_file)
        .map_err(|e| PipelineError::io(&location.backing_file, e))?;
    decode(&location.backing_file, bytes).map(Some)
}

fn read_archive_entry(location: &SourceLocation) -> Result<Option<String>, PipelineError> {
    let path = &location.backing_file;
    if !path.is_file() {
        return Ok(None);
    }
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|source| PipelineError::Archive {
        path: path.clone(),
        source,
    })?;

    let entry_name = format!("{}.json", location.plugin);
    let mut entry = match archive.by_name(&entry_name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            debug!(archive = %path.display(), entry = %entry_name, "Archive has no manifest entry");
            return Ok(None);
        }
        Err(source) => {
            return Err(PipelineError::Archive {
                path: path.clone(),
                source,
            })
        }
    };
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| PipelineError::io(path, e))?;
    decode(path, bytes).map(Some)
}

fn decode(path: &Path, bytes: Vec<u8>) -> Result<String, PipelineError> {
    String::from_utf8(bytes).map_err(|e| {
        PipelineError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })
}

fn check_unique(found: &[DiscoveredManifest]) -> Result<(), PipelineError> {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for item in found {
        let Some(name) = item.manifest.internal_name() else {
            continue;
        };
        if let Some(first) = seen.insert(name, item.location.backing_file.as_path()) {
            error!(internal_name = name, "Duplicate InternalName across plugins");
            return Err(PipelineError::DuplicateInternalName {
                name: name.to_string(),
                first: first.to_path_buf(),
                second: item.location.backing_file.clone(),
            });
        }
    }
    Ok(())
}
