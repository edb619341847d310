//! Release registry client.
//!
//! Asks a GitHub-style registry for the latest release of a repository and
//! turns the answer into a [`VersionInfo`]: the parsed version, the tag as
//! published, the URL of the archive to install and, when the release ships
//! one, the URL of a checksum file. The client has no side effects.

use crate::constants::{REGISTRY_TIMEOUT, USER_AGENT};
use crate::core::CheckError;
use crate::updater::config::SourceConfig;
use crate::updater::version::SemanticVersion;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// What the registry says the latest release is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// Parsed version.
    pub version: SemanticVersion,
    /// Release tag exactly as published, e.g. `v2.3.0`.
    pub tag: String,
    /// Archive to download.
    pub artifact_url: String,
    /// Checksum file published with the release, if any.
    pub checksum_url: Option<String>,
}

impl VersionInfo {
    /// File name of the artifact, the last segment of its URL.
    #[must_use]
    pub fn artifact_name(&self) -> &str {
        self.artifact_url.rsplit('/').next().unwrap_or(&self.artifact_url)
    }
}

#[derive(Debug, Deserialize)]
struct ReleasePayload {
    #[serde(default)]
    tag_name: Option<String>,
    #[serde(default)]
    assets: Vec<AssetPayload>,
}

#[derive(Debug, Deserialize)]
struct AssetPayload {
    name: String,
    browser_download_url: String,
}

/// Client for the `releases/latest` endpoint of one repository.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    registry_base: String,
    repository: String,
    source_archive_base: String,
    timeout: Duration,
}

impl ReleaseClient {
    /// Create a client for the repository named in `source`.
    #[must_use]
    pub fn new(source: &SourceConfig) -> Self {
        Self::with_http(http_client(), source)
    }

    /// Create a client sharing an existing HTTP connection pool.
    #[must_use]
    pub fn with_http(http: reqwest::Client, source: &SourceConfig) -> Self {
        Self {
            http,
            registry_base: source.registry_base.trim_end_matches('/').to_string(),
            repository: source.repository.trim_matches('/').to_string(),
            source_archive_base: source.source_archive_base.trim_end_matches('/').to_string(),
            timeout: REGISTRY_TIMEOUT,
        }
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL of the latest-release endpoint.
    #[must_use]
    pub fn latest_url(&self) -> String {
        format!("{}/{}/releases/latest", self.registry_base, self.repository)
    }

    /// Query the registry for the latest release.
    ///
    /// # Errors
    ///
    /// - [`CheckError::NotFound`] for HTTP 404
    /// - [`CheckError::Status`] for any other non-200 status
    /// - [`CheckError::Network`] for timeouts and transport failures
    /// - [`CheckError::Malformed`] when the body is not JSON or the tag is
    ///   missing or not a version
    pub async fn fetch_latest(&self) -> Result<VersionInfo, CheckError> {
        let url = self.latest_url();
        debug!("Checking for updates at {}", url);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CheckError::from_transport(&e))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(CheckError::NotFound),
            other => return Err(CheckError::Status(other.as_u16())),
        }

        let body = response.bytes().await.map_err(|e| CheckError::from_transport(&e))?;
        let payload: ReleasePayload =
            serde_json::from_slice(&body).map_err(|e| CheckError::Malformed(e.to_string()))?;

        let info = self.version_info(payload)?;
        debug!("Latest release {} ({})", info.version, info.artifact_url);
        Ok(info)
    }

    fn version_info(&self, payload: ReleasePayload) -> Result<VersionInfo, CheckError> {
        let tag = payload
            .tag_name
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CheckError::Malformed("release has no tag_name".to_string()))?;

        let version = SemanticVersion::parse_tag(&tag)
            .map_err(|e| CheckError::Malformed(format!("tag '{tag}' is not a version: {e}")))?;

        let zip_asset =
            payload.assets.iter().find(|a| a.name.to_ascii_lowercase().ends_with(".zip"));

        let (artifact_url, checksum_url) = match zip_asset {
            Some(asset) => {
                (asset.browser_download_url.clone(), checksum_asset(&payload.assets, &asset.name))
            }
            None => (
                format!(
                    "{}/{}/archive/refs/tags/{}.zip",
                    self.source_archive_base, self.repository, tag
                ),
                None,
            ),
        };

        Ok(VersionInfo {
            version,
            tag,
            artifact_url,
            checksum_url,
        })
    }
}

/// Shared HTTP client with the updater's user agent.
#[must_use]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// `<artifact>.sha256` wins over a combined checksum list.
fn checksum_asset(assets: &[AssetPayload], artifact: &str) -> Option<String> {
    let sidecar = format!("{artifact}.sha256").to_ascii_lowercase();
    assets
        .iter()
        .find(|a| a.name.to_ascii_lowercase() == sidecar)
        .or_else(|| {
            assets.iter().find(|a| {
                let name = a.name.to_ascii_lowercase();
                name == "sha256sums" || name == "checksums.txt"
            })
        })
        .map(|a| a.browser_download_url.clone())
}
