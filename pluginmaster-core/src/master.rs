//! Master writer: persists the catalog and reconciles its timestamps.
//!
//! The document is an indented JSON array (four spaces, no trailing newline) and is
//! always replaced atomically: it is written to a temp file beside the target and
//! renamed over it, so readers see either the old catalog or the new one.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::discover::SourceLocation;
use crate::error::PipelineError;
use crate::manifest::{Manifest, INTERNAL_NAME};

/// Serializes the catalog the way it is published.
pub fn render(master: &[Manifest]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    master.serialize(&mut ser)?;
    Ok(buf)
}

/// Atomically replaces `path` with the rendered catalog, creating parent directories.
pub fn write_master(path: &Path, master: &[Manifest]) -> Result<(), PipelineError> {
    let bytes = render(master).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| PipelineError::io(parent, e))?;
    if let Err(e) = tmp.write_all(&bytes).and_then(|_| tmp.flush()) {
        return Err(PipelineError::io(tmp.path(), e));
    }
    tmp.persist(path).map_err(|e| {
        error!(path = %path.display(), error = %e.error, "Failed to replace master document");
        PipelineError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        }
    })?;

    info!(path = %path.display(), plugins = master.len(), bytes = bytes.len(), "Wrote master document");
    Ok(())
}

/// Reads a previously written catalog.
pub fn read_master(path: &Path) -> Result<Vec<Manifest>, PipelineError> {
    let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    /// Plugins whose timestamp was absent or stale.
    pub updated: Vec<String>,
    /// Plugins whose backing store could not be found.
    pub missing: Vec<String>,
}

/// Re-derives each entry's timestamp from its backing store and rewrites the
/// document only if some entry was absent or stale.
pub fn reconcile_timestamps(config: &PipelineConfig) -> Result<ReconcileReport, PipelineError> {
    let path = &config.output;
    let field = config.timestamp_field.as_str();
    let mut master = read_master(path)?;
    let mut report = ReconcileReport::default();

    for entry in master.iter_mut() {
        let name = entry
            .internal_name()
            .ok_or_else(|| PipelineError::missing(INTERNAL_NAME, path.display().to_string()))?
            .to_string();
        report.checked += 1;

        let location = SourceLocation::for_plugin(config, &name);
        let modified = match location.modified_secs() {
            Ok(secs) => secs,
            Err(e) => {
                warn!(plugin = %name, error = %e, "Backing store missing, keeping stored timestamp");
                report.missing.push(name);
                continue;
            }
        };

        if needs_update(entry.get(field), modified) {
            debug!(plugin = %name, field, modified, "Timestamp absent or stale");
            entry.set(field, modified.to_string());
            report.updated.push(name);
        }
    }

    if report.updated.is_empty() {
        info!(checked = report.checked, "All timestamps current, master document untouched");
    } else {
        write_master(path, &master)?;
        info!(checked = report.checked, updated = report.updated.len(), "Reconciled timestamps");
    }
    Ok(report)
}

/// A stored timestamp is kept only when it reads back as the same integer.
fn needs_update(stored: Option<&Value>, modified: u64) -> bool {
    let stored = match stored {
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(Value::Number(n)) => n.as_u64(),
        _ => None,
    };
    stored != Some(modified)
}
