//! Artifact download.

use crate::constants::{DOWNLOAD_CHUNK_SIZE, DOWNLOAD_FILE_NAME, DOWNLOAD_TIMEOUT};
use crate::core::FetchError;
use crate::updater::release::http_client;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

/// Streams release archives into a scratch directory.
///
/// The caller owns the scratch directory (normally a [`tempfile::TempDir`])
/// and with it the lifetime of the downloaded file. A failed download never
/// leaves a partial file behind.
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    http: reqwest::Client,
    timeout: Duration,
}

impl Default for ArchiveFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::with_http(http_client())
    }

    #[must_use]
    pub const fn with_http(http: reqwest::Client) -> Self {
        Self {
            http,
            timeout: DOWNLOAD_TIMEOUT,
        }
    }

    /// Override the whole-transfer timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Download `url` to `dest_dir/update.zip`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::HttpStatus`] for a non-200 answer
    /// - [`FetchError::Network`] for transport failures and timeouts
    /// - [`FetchError::Io`] when the file cannot be written
    pub async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let dest = dest_dir.join(DOWNLOAD_FILE_NAME);
        debug!("Downloading {} to {}", url, dest.display());

        let result = match tokio::time::timeout(self.timeout, self.stream_to(url, &dest)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Network(format!("download timed out after {:?}", self.timeout))),
        };

        match result {
            Ok(bytes) => {
                debug!("Downloaded {} bytes", bytes);
                Ok(dest)
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&dest).await
                    && remove_err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to remove partial download {}: {}", dest.display(), remove_err);
                }
                Err(e)
            }
        }
    }

    async fn stream_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let file = File::create(dest).await.map_err(|e| FetchError::Io(e.to_string()))?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);
        let mut written = 0u64;

        while let Some(chunk) =
            response.chunk().await.map_err(|e| FetchError::Network(e.to_string()))?
        {
            writer.write_all(&chunk).await.map_err(|e| FetchError::Io(e.to_string()))?;
            written += chunk.len() as u64;
        }

        writer.flush().await.map_err(|e| FetchError::Io(e.to_string()))?;
        writer.into_inner().sync_all().await.map_err(|e| FetchError::Io(e.to_string()))?;
        Ok(written)
    }
}
