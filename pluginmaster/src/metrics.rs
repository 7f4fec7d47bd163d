#![doc = "Release-metrics client: resolves DownloadCount against a GitHub-style releases API."]
//
//! # Release metrics (CLI <-> Core)
//!
//! Bridges the [`DownloadCounter`] seam in `pluginmaster-core` to a real HTTP endpoint.
//!
//! - One GET per manifest: `{api_base}/repos/{owner}/{InternalName}/releases/tags/{tag}`.
//! - The count is the sum of `assets[].download_count`.
//! - Every request carries a `User-Agent` (the GitHub API rejects requests without one)
//!   and, when `GITHUB_TOKEN` is set, a bearer token.
//! - Each request is bounded by the configured timeout. Non-success statuses, timeouts
//!   and undecodable bodies come back as [`DownloadCountError`]; the enricher turns
//!   them into a zero count.

use std::env;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use pluginmaster_core::config::DownloadCountMode;
use pluginmaster_core::contract::{DownloadCounter, ZeroCount};
use pluginmaster_core::DownloadCountError;
use serde::Deserialize;

const USER_AGENT: &str = concat!("pluginmaster/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    #[serde(default)]
    download_count: u64,
}

pub struct GithubReleaseMetrics {
    client: reqwest::Client,
    api_base: String,
    owner: String,
    token: Option<String>,
}

impl std::fmt::Debug for GithubReleaseMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubReleaseMetrics")
            .field("api_base", &self.api_base)
            .field("owner", &self.owner)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl GithubReleaseMetrics {
    pub fn new(
        api_base: &str,
        owner: &str,
        timeout: Duration,
        token: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            token,
        })
    }

    /// Like [`new`](Self::new), taking the optional token from `GITHUB_TOKEN`.
    pub fn new_from_env(
        api_base: &str,
        owner: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let token = env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        tracing::info!(
            api_base,
            owner,
            token_set = token.is_some(),
            timeout_secs = timeout.as_secs(),
            "Initialised release metrics client"
        );
        Self::new(api_base, owner, timeout, token)
    }

    pub fn release_url(&self, internal_name: &str, tag: &str) -> String {
        format!(
            "{}/repos/{}/{}/releases/tags/{}",
            self.api_base, self.owner, internal_name, tag
        )
    }
}

#[async_trait]
impl DownloadCounter for GithubReleaseMetrics {
    async fn download_count(
        &self,
        internal_name: &str,
        tag: &str,
    ) -> Result<u64, DownloadCountError> {
        let url = self.release_url(internal_name, tag);
        tracing::debug!(url = %url, "Fetching release metrics");

        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadCountError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadCountError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let release: Release = response
            .json()
            .await
            .map_err(|e| DownloadCountError::Decode {
                url: url.clone(),
                message: e.to_string(),
            })?;
        let total: u64 = release.assets.iter().map(|a| a.download_count).sum();
        tracing::debug!(url = %url, assets = release.assets.len(), total, "Fetched release metrics");
        Ok(total)
    }
}

/// The counter the configured mode asks for.
pub fn counter_for(mode: &DownloadCountMode) -> anyhow::Result<Box<dyn DownloadCounter>> {
    match mode {
        DownloadCountMode::Zero => Ok(Box::new(ZeroCount)),
        DownloadCountMode::Github {
            owner,
            api_base,
            timeout_secs,
        } => {
            let client =
                GithubReleaseMetrics::new_from_env(api_base, owner, Duration::from_secs(*timeout_secs))
                    .context("Failed to construct release metrics client")?;
            Ok(Box::new(client))
        }
    }
}
