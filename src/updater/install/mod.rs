//! Staged, rollback-capable installation of a release archive.
//!
//! An install walks the live tree through these states:
//!
//! ```text
//! live ──copy──▶ <live>.staging ──overlay payload──▶ validated ──stamp version──┐
//!                                                                               │
//!   ┌──────────────── rename live → <live>.old, staging → live ◀─────────────────┘
//!   │
//!   ├─ reload ok ───────▶ <live>.old removed                  → Success
//!   ├─ reload failed ───▶ new tree removed, .old renamed back → RolledBack
//!   │  or timed out
//!   └─ no reloader ─────▶ <live>.old removed                  → RestartRequired
//! ```
//!
//! Before staging, a best-effort copy is kept at `<live>.backup`; it is the
//! rollback source of last resort and outlives the install.
//!
//! Every failure before the swap leaves the live tree untouched. All
//! filesystem work runs on the blocking pool; only the reload request is
//! awaited on the runtime.

mod backup;
mod manifest;
mod payload;
mod staging;
mod swap;

pub use manifest::{manifest_version, read_manifest};
pub use payload::{PayloadLayout, extract_archive, locate_payload};
pub use staging::ExcludeSet;
pub use swap::{swap_in, swap_in_with};

use crate::config::UpdaterConfig;
use crate::constants::{BACKUP_SUFFIX, OLD_SUFFIX, STAGING_SUFFIX};
use crate::core::{InstallError, UpdaterError};
use crate::updater::host::ComponentReloader;
use crate::updater::version::SemanticVersion;
use crate::utils::{remove_dir_all, sibling_path};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The live tree and its sibling working directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    pub live: PathBuf,
    pub backup: PathBuf,
    pub staging: PathBuf,
    pub old: PathBuf,
}

impl InstallPaths {
    #[must_use]
    pub fn for_live(live: &Path) -> Self {
        Self {
            live: live.to_path_buf(),
            backup: sibling_path(live, BACKUP_SUFFIX),
            staging: sibling_path(live, STAGING_SUFFIX),
            old: sibling_path(live, OLD_SUFFIX),
        }
    }
}

/// Where a rollback restored the live tree from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackSource {
    /// The `.old` tree moved aside during the swap.
    PreviousTree,
    /// The `.backup` copy taken before staging.
    Backup,
}

impl fmt::Display for RollbackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreviousTree => f.write_str("previous tree"),
            Self::Backup => f.write_str("backup"),
        }
    }
}

/// How an install that got as far as the swap ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// New tree live and accepted by the host.
    Success,
    /// New tree live; the host picks it up on its next restart.
    RestartRequired,
    /// The host rejected the new tree and the previous one was restored.
    RolledBack {
        source: RollbackSource,
        reason: String,
    },
}

type RenameFn = Arc<dyn Fn(&Path, &Path) -> io::Result<()> + Send + Sync>;

#[derive(Clone)]
struct InstallPlan {
    paths: InstallPaths,
    layout: PayloadLayout,
    required_files: Vec<String>,
    excludes: ExcludeSet,
    rename: RenameFn,
}

/// Installs release archives over one live tree.
#[derive(Clone)]
pub struct Installer {
    plan: Arc<InstallPlan>,
    reloader: Option<Arc<dyn ComponentReloader>>,
    instance_id: String,
    reload_settle: Duration,
    reload_timeout: Duration,
}

impl fmt::Debug for Installer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installer")
            .field("paths", &self.plan.paths)
            .field("layout", &self.plan.layout)
            .field("auto_reload", &self.reloader.is_some())
            .finish_non_exhaustive()
    }
}

impl Installer {
    /// Installer for `live` with the default required files and exclusions.
    #[must_use]
    pub fn new(live: &Path, layout: PayloadLayout) -> Self {
        let defaults = crate::updater::config::ComponentConfig::default();
        Self {
            plan: Arc::new(InstallPlan {
                paths: InstallPaths::for_live(live),
                layout,
                required_files: defaults.required_files,
                excludes: ExcludeSet::new(defaults.exclude.as_slice()),
                rename: Arc::new(|from, to| std::fs::rename(from, to)),
            }),
            reloader: None,
            instance_id: String::new(),
            reload_settle: Duration::from_secs(crate::constants::DEFAULT_RELOAD_SETTLE_SECS),
            reload_timeout: Duration::from_secs(crate::constants::DEFAULT_RELOAD_TIMEOUT_SECS),
        }
    }

    /// Installer configured from the `[component]` and `[install]` sections.
    ///
    /// `reloader` is ignored when `install.auto_reload` is off.
    #[must_use]
    pub fn from_config(config: &UpdaterConfig, reloader: Option<Arc<dyn ComponentReloader>>) -> Self {
        let component = &config.component;
        let layout = PayloadLayout {
            component_id: component.id.clone(),
            plugin_dir: component.plugin_dir.clone(),
            manifest_file: component.manifest_file.clone(),
        };
        let mut installer = Self::new(&config.live_root(), layout)
            .required_files(component.required_files.clone())
            .excludes(component.exclude.as_slice())
            .instance_id(component.instance_id.clone())
            .reload_settle(Duration::from_secs(config.install.reload_settle_secs))
            .reload_timeout(Duration::from_secs(config.install.reload_timeout_secs));
        if config.install.auto_reload
            && let Some(reloader) = reloader
        {
            installer = installer.reloader(reloader);
        }
        installer
    }

    #[must_use]
    pub fn required_files(mut self, files: Vec<String>) -> Self {
        self.plan_mut().required_files = files;
        self
    }

    #[must_use]
    pub fn excludes<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.plan_mut().excludes = ExcludeSet::new(patterns);
        self
    }

    #[must_use]
    pub fn reloader(mut self, reloader: Arc<dyn ComponentReloader>) -> Self {
        self.reloader = Some(reloader);
        self
    }

    #[must_use]
    pub fn instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    #[must_use]
    pub const fn reload_settle(mut self, settle: Duration) -> Self {
        self.reload_settle = settle;
        self
    }

    /// Bound on one reload request; a reload still running after it is
    /// treated as failed.
    #[must_use]
    pub const fn reload_timeout(mut self, timeout: Duration) -> Self {
        self.reload_timeout = timeout;
        self
    }

    /// Replace the rename used by the swap, for fault injection.
    #[doc(hidden)]
    #[must_use]
    pub fn rename_with<F>(mut self, rename: F) -> Self
    where
        F: Fn(&Path, &Path) -> io::Result<()> + Send + Sync + 'static,
    {
        self.plan_mut().rename = Arc::new(rename);
        self
    }

    fn plan_mut(&mut self) -> &mut InstallPlan {
        Arc::make_mut(&mut self.plan)
    }

    #[must_use]
    pub fn paths(&self) -> &InstallPaths {
        &self.plan.paths
    }

    /// Whether a reload is requested after the swap.
    #[must_use]
    pub fn auto_reload(&self) -> bool {
        self.reloader.is_some()
    }

    /// Version recorded in the live tree's manifest.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::ManifestUnreadable`] if the manifest is
    /// missing, unparseable or has no valid `version`.
    pub fn live_version(&self) -> Result<SemanticVersion, UpdaterError> {
        let path = self.plan.paths.live.join(&self.plan.layout.manifest_file);
        let unreadable = |reason: String| UpdaterError::ManifestUnreadable {
            path: path.display().to_string(),
            reason,
        };
        let raw = manifest_version(&path)
            .map_err(|e| unreadable(e.to_string()))?
            .ok_or_else(|| unreadable("no version field".to_string()))?;
        SemanticVersion::parse_tag(&raw).map_err(|e| unreadable(format!("'{raw}': {e}")))
    }

    /// Install `archive` as `target` and ask the host to reload it.
    ///
    /// # Errors
    ///
    /// Any [`InstallError`] other than
    /// [`InstallError::IrrecoverableState`] leaves the live tree as it was.
    pub async fn install_update(
        &self,
        archive: &Path,
        target: &SemanticVersion,
    ) -> Result<InstallOutcome, InstallError> {
        info!("Installing {} into {}", target, self.plan.paths.live.display());

        let plan = Arc::clone(&self.plan);
        let archive = archive.to_path_buf();
        let version = target.clone();
        tokio::task::spawn_blocking(move || plan.stage_and_swap(&archive, &version))
            .await
            .map_err(|e| InstallError::IrrecoverableState(format!("install task failed: {e}")))??;

        let Some(reloader) = &self.reloader else {
            self.discard_old().await;
            info!("Installed {}; restart the host to load it", target);
            return Ok(InstallOutcome::RestartRequired);
        };

        tokio::time::sleep(self.reload_settle).await;

        let reload = tokio::time::timeout(
            self.reload_timeout,
            reloader.reload_component(&self.instance_id),
        )
        .await;
        let reason = match reload {
            Ok(Ok(true)) => {
                self.discard_old().await;
                info!("Installed and reloaded {}", target);
                return Ok(InstallOutcome::Success);
            }
            Ok(Ok(false)) => "host did not accept the reload".to_string(),
            Ok(Err(e)) => format!("reload failed: {e:#}"),
            Err(_) => format!("reload timed out after {:?}", self.reload_timeout),
        };

        warn!("Rolling back {}: {}", target, reason);
        let plan = Arc::clone(&self.plan);
        let source = tokio::task::spawn_blocking(move || swap::roll_back(&plan.paths))
            .await
            .map_err(|e| InstallError::IrrecoverableState(format!("rollback task failed: {e}")))??;

        Ok(InstallOutcome::RolledBack {
            source,
            reason,
        })
    }

    /// Restore the live tree from `<live>.backup`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::BackupNotFound`] when there is no backup, or
    /// the filesystem error that stopped the restore.
    pub async fn restore_backup(&self) -> anyhow::Result<()> {
        let plan = Arc::clone(&self.plan);
        if !plan.paths.backup.is_dir() {
            return Err(UpdaterError::BackupNotFound {
                path: plan.paths.backup.display().to_string(),
            }
            .into());
        }
        tokio::task::spawn_blocking(move || backup::restore_from_backup(&plan.paths)).await?
    }

    async fn discard_old(&self) {
        let plan = Arc::clone(&self.plan);
        if let Err(e) = tokio::task::spawn_blocking(move || swap::discard_old(&plan.paths)).await {
            warn!("Failed to clean up previous tree: {}", e);
        }
    }
}

impl InstallPlan {
    fn stage_and_swap(&self, archive: &Path, target: &SemanticVersion) -> Result<(), InstallError> {
        let extract_dir = tempfile::TempDir::new()
            .map_err(|e| InstallError::Staging(format!("cannot create extraction dir: {e}")))?;
        extract_archive(archive, extract_dir.path())?;
        let payload = locate_payload(extract_dir.path(), &self.layout)?;

        if !self.paths.live.is_dir() {
            return Err(InstallError::Staging(format!(
                "live tree {} does not exist",
                self.paths.live.display()
            )));
        }

        if let Err(e) = backup::create_backup(&self.paths) {
            warn!("Continuing without backup: {:#}", e);
        }

        let supplied =
            staging::prepare_staging(&self.paths.live, &payload, &self.paths.staging, &self.excludes)?;

        let manifest_path = self.paths.staging.join(&self.layout.manifest_file);
        let validated = manifest::check_required_files(
            &self.paths.staging,
            &supplied,
            &self.required_files,
        )
        .and_then(|()| manifest::check_manifest(&manifest_path, target))
        .and_then(|()| manifest::stamp_version(&manifest_path, target));

        if let Err(e) = validated {
            if let Err(rm) = remove_dir_all(&self.paths.staging) {
                warn!("Failed to remove {}: {:#}", self.paths.staging.display(), rm);
            }
            return Err(e);
        }

        swap_in_with(&self.paths, |from, to| (self.rename)(from, to))
    }
}
