//! One update pass: check, compare, download, verify, install, notify.

use crate::config::UpdaterConfig;
use crate::core::{FetchError, InstallError};
use crate::updater::fetch::ArchiveFetcher;
use crate::updater::host::{ComponentReloader, LogNotifier, Notice, Notifier, WebhookNotifier};
use crate::updater::install::{InstallOutcome, Installer};
use crate::updater::release::{ReleaseClient, VersionInfo, http_client};
use crate::updater::verification::ChecksumVerifier;
use crate::updater::version::{SemanticVersion, should_update};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of one update cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The live tree already runs the latest release.
    UpToDate,
    /// Installed and reloaded.
    Updated(SemanticVersion),
    /// Installed; waiting for a host restart.
    RestartRequired(SemanticVersion),
    /// Installed, rejected by the host and rolled back.
    RolledBack {
        version: SemanticVersion,
        reason: String,
    },
    /// Failed with the live tree untouched. `version` is `None` when no
    /// install was attempted (registry errors, unreadable live manifest).
    Failed {
        version: Option<SemanticVersion>,
        reason: String,
    },
    /// Recovery failed; the live tree needs manual attention.
    Irrecoverable {
        version: SemanticVersion,
        reason: String,
    },
}

impl CycleOutcome {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::RolledBack { .. } | Self::Failed { .. } | Self::Irrecoverable { .. })
    }

    /// The release this cycle tried to install, if it got that far.
    #[must_use]
    pub const fn attempted_version(&self) -> Option<&SemanticVersion> {
        match self {
            Self::UpToDate => None,
            Self::Failed {
                version,
                ..
            } => version.as_ref(),
            Self::Updated(version)
            | Self::RestartRequired(version)
            | Self::RolledBack {
                version,
                ..
            }
            | Self::Irrecoverable {
                version,
                ..
            } => Some(version),
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => write!(f, "up to date"),
            Self::Updated(v) => write!(f, "updated to {v}"),
            Self::RestartRequired(v) => write!(f, "installed {v}, restart required"),
            Self::RolledBack {
                version,
                reason,
            } => write!(f, "{version} rolled back: {reason}"),
            Self::Failed {
                version: Some(v),
                reason,
            } => write!(f, "update to {v} failed: {reason}"),
            Self::Failed {
                version: None,
                reason,
            } => write!(f, "update check failed: {reason}"),
            Self::Irrecoverable {
                version,
                reason,
            } => write!(f, "update to {version} left the tree broken: {reason}"),
        }
    }
}

/// Something the scheduler can run once per due check.
#[async_trait]
pub trait UpdateCycle: Send + Sync {
    /// Run one cycle. Never fails; every error is folded into the outcome.
    async fn run_cycle(&self) -> CycleOutcome;
}

/// Keeps one component's live tree at the latest release.
pub struct ComponentUpdater {
    component_id: String,
    client: ReleaseClient,
    fetcher: ArchiveFetcher,
    installer: Installer,
    notifier: Arc<dyn Notifier>,
    http: reqwest::Client,
    verify_checksum: bool,
    force: bool,
}

impl fmt::Debug for ComponentUpdater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentUpdater")
            .field("component_id", &self.component_id)
            .field("client", &self.client)
            .field("installer", &self.installer)
            .field("verify_checksum", &self.verify_checksum)
            .field("force", &self.force)
            .finish_non_exhaustive()
    }
}

impl ComponentUpdater {
    #[must_use]
    pub fn new(
        component_id: impl Into<String>,
        client: ReleaseClient,
        installer: Installer,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let http = http_client();
        Self {
            component_id: component_id.into(),
            client,
            fetcher: ArchiveFetcher::with_http(http.clone()),
            installer,
            notifier,
            http,
            verify_checksum: true,
            force: false,
        }
    }

    /// Build everything from the configuration file.
    ///
    /// The notifier posts to `notify.webhook_url` when set and logs otherwise.
    #[must_use]
    pub fn from_config(config: &UpdaterConfig, reloader: Option<Arc<dyn ComponentReloader>>) -> Self {
        let http = http_client();
        let notifier: Arc<dyn Notifier> = match &config.notify.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
            None => Arc::new(LogNotifier),
        };
        Self {
            component_id: config.component.id.clone(),
            client: ReleaseClient::with_http(http.clone(), &config.source),
            fetcher: ArchiveFetcher::with_http(http.clone()),
            installer: Installer::from_config(config, reloader),
            notifier,
            http,
            verify_checksum: config.install.verify_checksum,
            force: false,
        }
    }

    #[must_use]
    pub fn fetcher(mut self, fetcher: ArchiveFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    #[must_use]
    pub const fn verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// Install the latest release even when it is not newer.
    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub const fn installer(&self) -> &Installer {
        &self.installer
    }

    #[must_use]
    pub const fn client(&self) -> &ReleaseClient {
        &self.client
    }

    async fn check_and_update(&self) -> CycleOutcome {
        let installer = self.installer.clone();
        let live = match tokio::task::spawn_blocking(move || installer.live_version()).await {
            Ok(live) => live,
            Err(e) => {
                error!("Version lookup crashed: {}", e);
                return CycleOutcome::Failed {
                    version: None,
                    reason: format!("version lookup task failed: {e}"),
                };
            }
        };
        let current = match live {
            Ok(version) => Some(version),
            Err(e) if self.force => {
                warn!("{}; reinstalling anyway", e);
                None
            }
            Err(e) => {
                error!("Cannot determine installed version: {}", e);
                return CycleOutcome::Failed {
                    version: None,
                    reason: e.to_string(),
                };
            }
        };

        let info = match self.client.fetch_latest().await {
            Ok(info) => info,
            Err(e) => {
                warn!("Update check failed: {}", e);
                return CycleOutcome::Failed {
                    version: None,
                    reason: e.to_string(),
                };
            }
        };

        if let Some(current) = &current
            && !self.force
            && !should_update(current, &info.version)
        {
            info!("{} {} is up to date (latest {})", self.component_id, current, info.version);
            return CycleOutcome::UpToDate;
        }

        info!(
            "Updating {} {} -> {}",
            self.component_id,
            current.as_ref().map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            info.version
        );
        self.download_and_install(&info).await
    }

    async fn download_and_install(&self, info: &VersionInfo) -> CycleOutcome {
        let version = info.version.clone();
        let fail = |reason: String| CycleOutcome::Failed {
            version: Some(version.clone()),
            reason,
        };

        let scratch = match tempfile::TempDir::new() {
            Ok(dir) => dir,
            Err(e) => return fail(format!("cannot create download directory: {e}")),
        };

        let archive = match self.fetcher.download(&info.artifact_url, scratch.path()).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Download of {} failed: {}", info.version, e);
                return fail(e.to_string());
            }
        };

        if let Err(e) = self.verify(info, &archive).await {
            warn!("Verification of {} failed: {}", info.version, e);
            if matches!(e, FetchError::ChecksumMismatch { .. }) {
                self.notifier.notify(&Notice::failed(
                    &self.component_id,
                    &version.to_string(),
                    &e.to_string(),
                ));
            }
            return fail(e.to_string());
        }

        self.apply(&archive, &version).await
    }

    async fn verify(&self, info: &VersionInfo, archive: &Path) -> Result<(), FetchError> {
        if !self.verify_checksum {
            return Ok(());
        }
        match &info.checksum_url {
            Some(url) => {
                ChecksumVerifier::verify_from_release(&self.http, archive, url, info.artifact_name())
                    .await
                    .map(|_| ())
            }
            None => {
                warn!("Release {} publishes no checksum, skipping verification", info.tag);
                Ok(())
            }
        }
    }

    /// Install a local archive as `version` and notify about the result.
    pub async fn apply(&self, archive: &Path, version: &SemanticVersion) -> CycleOutcome {
        let v = version.to_string();
        match self.installer.install_update(archive, version).await {
            Ok(InstallOutcome::Success) => {
                self.notifier.notify(&Notice::updated(&self.component_id, &v));
                CycleOutcome::Updated(version.clone())
            }
            Ok(InstallOutcome::RestartRequired) => {
                self.notifier.notify(&Notice::restart_required(&self.component_id, &v));
                CycleOutcome::RestartRequired(version.clone())
            }
            Ok(InstallOutcome::RolledBack {
                source,
                reason,
            }) => {
                warn!("Update to {} rolled back from {}: {}", v, source, reason);
                self.notifier.notify(&Notice::rolled_back(&self.component_id, &v, &reason));
                CycleOutcome::RolledBack {
                    version: version.clone(),
                    reason,
                }
            }
            Err(InstallError::IrrecoverableState(reason)) => {
                error!("Update to {} left {} broken: {}", v, self.installer.paths().live.display(), reason);
                self.notifier.notify(&Notice::irrecoverable(&self.component_id, &v, &reason));
                CycleOutcome::Irrecoverable {
                    version: version.clone(),
                    reason,
                }
            }
            Err(e) => {
                warn!("Update to {} failed: {}", v, e);
                self.notifier.notify(&Notice::failed(&self.component_id, &v, &e.to_string()));
                CycleOutcome::Failed {
                    version: Some(version.clone()),
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl UpdateCycle for ComponentUpdater {
    async fn run_cycle(&self) -> CycleOutcome {
        self.check_and_update().await
    }
}
