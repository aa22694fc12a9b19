//! Remote release client
//!
//! Queries the "latest release" endpoint for the newest published firmware.
//! Every failure collapses to `None`; callers simply retry on a later check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use serde::Deserialize;

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::images::FirmwareRelease;
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "update::release";

/// Source of the newest published firmware release
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// One best-effort attempt, no retries
    async fn fetch_latest_release(&self) -> Option<FirmwareRelease>;
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    tag_name: String,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    browser_download_url: String,
    name: Option<String>,
    /// Format: "sha256:<hex>"
    digest: Option<String>,
}

fn parse_digest(digest: &str) -> Option<String> {
    let hash = digest
        .strip_prefix("sha256:")
        .unwrap_or(digest)
        .to_lowercase();

    if hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hash)
    } else {
        log_warn!(MODULE, "Ignoring invalid asset digest: {}", digest);
        None
    }
}

/// Parse a release response body; a release without assets is invalid
pub fn parse_release(body: &str) -> Result<FirmwareRelease> {
    let response: ReleaseResponse = serde_json::from_str(body)
        .map_err(|e| CoordinatorError::NetworkOrParseFailure(format!("Bad release JSON: {}", e)))?;

    let tag = response.tag_name.trim();
    let version = tag
        .strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag);
    if version.is_empty() {
        return Err(CoordinatorError::NetworkOrParseFailure(
            "Release has an empty tag".to_string(),
        ));
    }

    let asset = response.assets.into_iter().next().ok_or_else(|| {
        CoordinatorError::NetworkOrParseFailure(format!("Release {} has no assets", tag))
    })?;

    Ok(FirmwareRelease {
        version: version.to_string(),
        download_url: asset.browser_download_url,
        asset_name: asset.name,
        sha256: asset.digest.as_deref().and_then(parse_digest),
        published_at: response
            .published_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc)),
    })
}

/// HTTP client for the release endpoint
#[derive(Debug, Clone)]
pub struct RemoteReleaseClient {
    client: Client,
    url: String,
}

impl RemoteReleaseClient {
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            url: config.release_url.clone(),
        })
    }

    async fn try_fetch(&self) -> Result<FirmwareRelease> {
        log_debug!(MODULE, "Fetching latest release from {}", self.url);

        // Always go to the origin, never a cached copy
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/vnd.github.v3+json")
            .header(PRAGMA, "no-cache")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CoordinatorError::NetworkOrParseFailure(format!(
                "Release endpoint returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        parse_release(&body)
    }
}

#[async_trait]
impl ReleaseSource for RemoteReleaseClient {
    async fn fetch_latest_release(&self) -> Option<FirmwareRelease> {
        match self.try_fetch().await {
            Ok(release) => {
                log_info!(
                    MODULE,
                    "Latest firmware release: {} ({})",
                    release.version,
                    release.download_url
                );
                Some(release)
            }
            Err(e) => {
                log_warn!(MODULE, "{}", e);
                None
            }
        }
    }
}
