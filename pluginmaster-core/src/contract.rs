//! # contract: seams between the pipeline and the outside world
//!
//! - [`DiscoveredManifest`] is what the reader hands to the rest of the pipeline.
//! - [`DownloadCounter`] resolves `DownloadCount` for one release. The networked
//!   implementation lives in the `pluginmaster` binary crate; [`ZeroCount`] is the
//!   offline default.
//!
//! The counter trait is annotated for `mockall` so tests can script counts.

use async_trait::async_trait;

#[allow(unused_imports)]
use mockall::{automock, predicate::*};

use crate::discover::SourceLocation;
use crate::error::DownloadCountError;
use crate::manifest::Manifest;

/// One raw manifest and where it was found.
#[derive(Debug, Clone)]
pub struct DiscoveredManifest {
    pub manifest: Manifest,
    pub location: SourceLocation,
}

/// Looks up how often a plugin release has been downloaded.
///
/// Errors are reported, not swallowed, so the enricher can log them before
/// falling back to zero.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DownloadCounter: Send + Sync {
    /// Total downloads across all assets of release `tag` of `internal_name`.
    async fn download_count(
        &self,
        internal_name: &str,
        tag: &str,
    ) -> Result<u64, DownloadCountError>;
}

/// Always zero. Needs no network.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroCount;

#[async_trait]
impl DownloadCounter for ZeroCount {
    async fn download_count(
        &self,
        _internal_name: &str,
        _tag: &str,
    ) -> Result<u64, DownloadCountError> {
        Ok(0)
    }
}
