//! SHA-256 checks for downloaded release archives.
//!
//! A release without a published checksum is installed unverified; a
//! published checksum that does not match rejects the archive.

use crate::core::FetchError;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// Verifies downloaded archives against checksums published with a release.
///
/// Releases publish checksums either as a sidecar file (`bridge.zip.sha256`,
/// holding just the digest or `digest  name`) or as a combined list
/// (`SHA256SUMS`, `checksums.txt`) with one `digest  name` line per artifact.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Hex-encoded SHA-256 of a file.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Io`] if the file cannot be read.
    pub async fn compute_sha256(file_path: &Path) -> Result<String, FetchError> {
        debug!("Computing SHA256 checksum for: {}", file_path.display());

        let mut file = File::open(file_path).await.map_err(|e| FetchError::Io(e.to_string()))?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).await.map_err(|e| FetchError::Io(e.to_string()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Compare a file against an expected digest, ignoring case and an
    /// optional `sha256:` prefix.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ChecksumMismatch`] when the digests differ.
    pub async fn verify_checksum(file_path: &Path, expected: &str) -> Result<(), FetchError> {
        let expected = normalize(expected);
        let actual = Self::compute_sha256(file_path).await?;

        if actual != expected {
            return Err(FetchError::ChecksumMismatch {
                expected,
                actual,
            });
        }

        info!("Checksum verified for {}", file_path.display());
        Ok(())
    }

    /// Find the digest for `artifact_name` in checksum file content.
    ///
    /// A file with a single bare digest is taken as the sidecar of the
    /// artifact.
    #[must_use]
    pub fn parse_checksums(content: &str, artifact_name: &str) -> Option<String> {
        let lines: Vec<&str> =
            content.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

        if let [only] = lines.as_slice() {
            let mut parts = only.split_whitespace();
            if let (Some(digest), None) = (parts.next(), parts.next()) {
                return Some(normalize(digest));
            }
        }

        lines.iter().find_map(|line| {
            let mut parts = line.split_whitespace();
            let digest = parts.next()?;
            // `sha256sum -b` marks binary mode with a leading '*'
            let name = parts.next()?.trim_start_matches('*');
            let matches = name == artifact_name || name.ends_with(&format!("/{artifact_name}"));
            matches.then(|| normalize(digest))
        })
    }

    /// Download a checksum file and look up `artifact_name`.
    ///
    /// Returns `Ok(None)` when the file cannot be fetched or does not list
    /// the artifact.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] for transport failures.
    pub async fn fetch_expected_checksum(
        http: &reqwest::Client,
        checksums_url: &str,
        artifact_name: &str,
    ) -> Result<Option<String>, FetchError> {
        debug!("Fetching checksums from: {}", checksums_url);

        let response = http
            .get(checksums_url)
            .timeout(crate::constants::REGISTRY_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            warn!("Failed to fetch checksums file: HTTP {}", response.status());
            return Ok(None);
        }

        let content = response.text().await.map_err(|e| FetchError::Network(e.to_string()))?;
        let found = Self::parse_checksums(&content, artifact_name);
        if found.is_none() {
            warn!("No checksum listed for {}", artifact_name);
        }
        Ok(found)
    }

    /// Fetch the published checksum and verify the file against it.
    ///
    /// Returns `Ok(false)` when no checksum was available and verification
    /// was skipped.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ChecksumMismatch`] on mismatch, or the error from
    /// fetching or hashing.
    pub async fn verify_from_release(
        http: &reqwest::Client,
        file_path: &Path,
        checksums_url: &str,
        artifact_name: &str,
    ) -> Result<bool, FetchError> {
        match Self::fetch_expected_checksum(http, checksums_url, artifact_name).await? {
            Some(expected) => {
                Self::verify_checksum(file_path, &expected).await?;
                Ok(true)
            }
            None => {
                warn!("No checksum available for verification, skipping");
                Ok(false)
            }
        }
    }
}

fn normalize(digest: &str) -> String {
    digest.trim().trim_start_matches("sha256:").to_ascii_lowercase()
}
