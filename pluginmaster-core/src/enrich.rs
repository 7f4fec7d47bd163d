//! Field enricher: computes every derived field of a (projected) manifest.
//!
//! Order matters: the download link must exist before the duplication rules copy it.
//! Apart from the injected [`DownloadCounter`] this is a pure function of the
//! manifest, its source location and the config.

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::{DownloadLinkStrategy, PipelineConfig};
use crate::contract::DownloadCounter;
use crate::discover::SourceLocation;
use crate::error::PipelineError;
use crate::manifest::{
    Manifest, ASSEMBLY_VERSION, DEFAULTS, DOWNLOAD_COUNT, DOWNLOAD_LINK_INSTALL, DUPLICATES,
    INTERNAL_NAME, REPO_URL,
};

/// Populates download links, policy defaults, duplicated fields, the download count and
/// the last-update timestamp.
pub async fn enrich(
    mut manifest: Manifest,
    location: &SourceLocation,
    config: &PipelineConfig,
    counter: &dyn DownloadCounter,
) -> Result<Manifest, PipelineError> {
    let name = manifest
        .internal_name()
        .ok_or_else(|| {
            error!(plugin = %location.plugin, "Manifest has no InternalName");
            PipelineError::missing(INTERNAL_NAME, location.plugin.clone())
        })?
        .to_string();

    let link = download_link(&config.download_link, &manifest, &name, &config.tag_prefix)?;
    manifest.set(DOWNLOAD_LINK_INSTALL, link);

    apply_defaults(&mut manifest);
    if config.duplicate_download_links {
        apply_duplicates(&mut manifest, &name)?;
    }

    let count = resolve_download_count(&manifest, &name, &config.tag_prefix, counter).await;
    manifest.set(DOWNLOAD_COUNT, count);

    let modified = location.modified_secs()?;
    manifest.set(config.timestamp_field.as_str(), modified.to_string());

    debug!(plugin = %name, download_count = count, last_update = modified, "Enriched manifest");
    Ok(manifest)
}

/// Builds `DownloadLinkInstall` for `name` under the deployment's strategy.
pub fn download_link(
    strategy: &DownloadLinkStrategy,
    manifest: &Manifest,
    name: &str,
    tag_prefix: &str,
) -> Result<String, PipelineError> {
    let link = match strategy {
        DownloadLinkStrategy::FixedHost { template } => template.replace("{plugin_name}", name),
        DownloadLinkStrategy::RepoUrl => required(manifest, REPO_URL, name)?.to_string(),
        DownloadLinkStrategy::Branch {
            base_url,
            branch,
            file_name,
        } => {
            let branch = branch.as_deref().ok_or_else(|| {
                PipelineError::Config("branch download links need a branch".to_string())
            })?;
            format!(
                "{}/{branch}/plugins/{name}/{file_name}",
                base_url.trim_end_matches('/')
            )
        }
        DownloadLinkStrategy::ReleaseAsset { asset } => {
            let repo = required(manifest, REPO_URL, name)?;
            let version = required(manifest, ASSEMBLY_VERSION, name)?;
            format!(
                "{}/releases/download/{tag_prefix}{version}/{asset}",
                repo.trim_end_matches('/')
            )
        }
    };
    Ok(link)
}

fn required<'m>(manifest: &'m Manifest, field: &str, name: &str) -> Result<&'m str, PipelineError> {
    manifest.str_field(field).ok_or_else(|| {
        error!(plugin = %name, field, "Manifest lacks a field its download link needs");
        PipelineError::missing(field, name)
    })
}

/// Backfills each policy field the manifest leaves out. Explicit values, `false` and
/// `null` included, are kept.
pub fn apply_defaults(manifest: &mut Manifest) {
    for (field, default) in DEFAULTS {
        manifest.set_if_absent(field, default.to_value());
    }
}

/// Copies each duplication source into its absent targets.
pub fn apply_duplicates(manifest: &mut Manifest, name: &str) -> Result<(), PipelineError> {
    for (source, targets) in DUPLICATES {
        let value: Value = manifest
            .get(source)
            .cloned()
            .ok_or_else(|| PipelineError::missing(source, name))?;
        for target in *targets {
            manifest.set_if_absent(target, value.clone());
        }
    }
    Ok(())
}

async fn resolve_download_count(
    manifest: &Manifest,
    name: &str,
    tag_prefix: &str,
    counter: &dyn DownloadCounter,
) -> u64 {
    let Some(version) = manifest.assembly_version() else {
        debug!(plugin = %name, "No AssemblyVersion, download count is zero");
        return 0;
    };
    let tag = format!("{tag_prefix}{version}");
    match counter.download_count(name, &tag).await {
        Ok(count) => count,
        Err(e) => {
            warn!(plugin = %name, tag = %tag, error = %e, "Download count unavailable, using zero");
            0
        }
    }
}
