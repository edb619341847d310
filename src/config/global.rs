//! Updater configuration file.
//!
//! The configuration lives in a single TOML file, by default
//! `~/.component-updater/config.toml` (`%LOCALAPPDATA%\component-updater\config.toml`
//! on Windows). Every field has a default, so a minimal file only names the
//! release repository and the component:
//!
//! ```toml
//! [source]
//! repository = "acme/ble-bridge"
//!
//! [component]
//! id = "ble_bridge"
//! live_root = "~/.homeassistant/custom_components/ble_bridge"
//! instance_id = "living-room"
//!
//! [install]
//! reload_command = ["systemctl", "restart", "home-assistant"]
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use component_updater::config::UpdaterConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::load_with_optional(None).await?;
//! config.validate()?;
//! println!("Live tree: {}", config.live_root().display());
//! # Ok(())
//! # }
//! ```

use crate::core::UpdaterError;
use crate::updater::config::{
    ComponentConfig, InstallConfig, NotifyConfig, ScheduleConfig, SourceConfig,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Complete updater configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Release registry settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// The component and its live tree.
    #[serde(default)]
    pub component: ComponentConfig,

    /// Background check timing.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Install and reload behaviour.
    #[serde(default)]
    pub install: InstallConfig,

    /// User notifications.
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl UpdaterConfig {
    /// Load from `path` when given, otherwise from [`Self::default_path`].
    ///
    /// A missing file yields the default configuration, which
    /// [`Self::validate`] then rejects with a pointer to what is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this schema.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(UpdaterError::from).with_context(
            || format!("Failed to parse config from {}", path.display()),
        )?;
        Ok(config)
    }

    /// Write the configuration as pretty TOML, creating parent directories.
    ///
    /// The file is restricted to the owner on Unix since webhook URLs often
    /// embed tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.with_context(|| {
                format!("Failed to set permissions on {}", path.display())
            })?;
        }

        Ok(())
    }

    /// Platform default location of the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or local data) directory is unknown.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("component-updater")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".component-updater")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// The live tree with `~` and environment variables expanded.
    #[must_use]
    pub fn live_root(&self) -> PathBuf {
        let raw = self.component.live_root.to_string_lossy();
        match shellexpand::full(&raw) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(_) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
        }
    }

    /// Check the configuration is usable before any network or disk work.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::ConfigError`] describing the first problem.
    pub fn validate(&self) -> Result<(), UpdaterError> {
        let repo = self.source.repository.trim();
        if repo.is_empty() {
            return Err(config_error("source.repository is not set"));
        }
        let mut parts = repo.split('/');
        let well_formed = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        );
        if !well_formed {
            return Err(config_error(format!(
                "source.repository must look like owner/name, got '{repo}'"
            )));
        }

        if self.component.id.trim().is_empty() {
            return Err(config_error("component.id is not set"));
        }
        if self.live_root().file_name().is_none() {
            return Err(config_error(format!(
                "component.live_root must name a directory, got '{}'",
                self.component.live_root.display()
            )));
        }
        if self.component.manifest_file.trim().is_empty() {
            return Err(config_error("component.manifest_file must not be empty"));
        }
        if self.schedule.retry_on_failure && self.schedule.max_retries == 0 {
            return Err(config_error(
                "schedule.max_retries must be at least 1 when retry_on_failure is enabled",
            ));
        }
        if self.schedule.poll_tick_secs == 0 {
            return Err(config_error("schedule.poll_tick_secs must be at least 1"));
        }
        if self.install.reload_timeout_secs == 0 {
            return Err(config_error("install.reload_timeout_secs must be at least 1"));
        }
        for pattern in &self.component.exclude {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(config_error(format!("invalid exclude pattern '{pattern}': {e}")));
            }
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> UpdaterError {
    UpdaterError::ConfigError {
        message: message.into(),
    }
}
