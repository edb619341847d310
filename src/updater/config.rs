use crate::constants::{
    DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_ENTRY_POINT, DEFAULT_EXCLUDES, DEFAULT_MANIFEST_FILE,
    DEFAULT_MAX_RETRIES, DEFAULT_PLUGIN_DIR, DEFAULT_POLL_TICK_SECS, DEFAULT_REGISTRY_BASE,
    DEFAULT_RELOAD_SETTLE_SECS, DEFAULT_RELOAD_TIMEOUT_SECS, DEFAULT_RETRY_DELAY_SECS,
    DEFAULT_SOURCE_ARCHIVE_BASE, DEFAULT_STARTUP_DELAY_SECS,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where releases are published.
///
/// ```toml
/// [source]
/// repository = "acme/ble-bridge"
/// registry_base = "https://api.github.com/repos"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// `owner/name` of the release repository.
    #[serde(default)]
    pub repository: String,

    /// Base of the registry API; `releases/latest` is queried below it.
    #[serde(default = "default_registry_base")]
    pub registry_base: String,

    /// Base used to synthesize a source-archive URL when a release has no
    /// `.zip` asset.
    #[serde(default = "default_source_archive_base")]
    pub source_archive_base: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            repository: String::new(),
            registry_base: default_registry_base(),
            source_archive_base: default_source_archive_base(),
        }
    }
}

/// The component being kept up to date and its on-disk layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Component identifier, also the directory name inside release archives.
    #[serde(default)]
    pub id: String,

    /// Live tree the host loads the component from. `~` is expanded.
    #[serde(default)]
    pub live_root: PathBuf,

    /// Instance identifier handed to the reloader.
    #[serde(default)]
    pub instance_id: String,

    /// Parent directory of the component inside release archives.
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: String,

    /// Manifest file carrying the `version` field.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,

    /// Files every release must ship.
    #[serde(default = "default_required_files")]
    pub required_files: Vec<String>,

    /// Glob patterns skipped while staging, matched against each path
    /// component.
    #[serde(default = "default_excludes")]
    pub exclude: Vec<String>,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            live_root: PathBuf::new(),
            instance_id: String::new(),
            plugin_dir: default_plugin_dir(),
            manifest_file: default_manifest_file(),
            required_files: default_required_files(),
            exclude: default_excludes(),
        }
    }
}

/// Background check timing and retry policy, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_poll_tick_secs")]
    pub poll_tick_secs: u64,

    /// Disable to wait for the next regular check after any failure.
    #[serde(default = "default_true")]
    pub retry_on_failure: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            startup_delay_secs: default_startup_delay_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            max_retries: default_max_retries(),
            poll_tick_secs: default_poll_tick_secs(),
            retry_on_failure: true,
        }
    }
}

impl ScheduleConfig {
    /// Convert to the policy the scheduler works with.
    #[must_use]
    pub const fn policy(&self) -> SchedulePolicy {
        SchedulePolicy {
            check_interval: Duration::from_secs(self.check_interval_secs),
            startup_delay: Duration::from_secs(self.startup_delay_secs),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            max_retries: self.max_retries,
            poll_tick: Duration::from_secs(self.poll_tick_secs),
            retry_on_failure: self.retry_on_failure,
        }
    }
}

/// Timing and retry policy for the update scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    pub check_interval: Duration,
    pub startup_delay: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub poll_tick: Duration,
    pub retry_on_failure: bool,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        ScheduleConfig::default().policy()
    }
}

/// How installs are applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Ask the host to reload after the swap. When disabled the new tree is
    /// left for the next host restart.
    #[serde(default = "default_true")]
    pub auto_reload: bool,

    /// Command run to reload the component, as argv. Required when
    /// `auto_reload` is on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reload_command: Vec<String>,

    /// Pause between the swap and the reload request.
    #[serde(default = "default_reload_settle_secs")]
    pub reload_settle_secs: u64,

    /// Longest a reload may take before it counts as failed and the
    /// install is rolled back.
    #[serde(default = "default_reload_timeout_secs")]
    pub reload_timeout_secs: u64,

    /// Verify the archive against a published checksum when one exists.
    #[serde(default = "default_true")]
    pub verify_checksum: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            auto_reload: true,
            reload_command: Vec::new(),
            reload_settle_secs: default_reload_settle_secs(),
            reload_timeout_secs: default_reload_timeout_secs(),
            verify_checksum: true,
        }
    }
}

/// Where user notifications go. Without a webhook they are only logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

fn default_registry_base() -> String {
    DEFAULT_REGISTRY_BASE.to_string()
}

fn default_source_archive_base() -> String {
    DEFAULT_SOURCE_ARCHIVE_BASE.to_string()
}

fn default_plugin_dir() -> String {
    DEFAULT_PLUGIN_DIR.to_string()
}

fn default_manifest_file() -> String {
    DEFAULT_MANIFEST_FILE.to_string()
}

fn default_required_files() -> Vec<String> {
    vec![DEFAULT_MANIFEST_FILE.to_string(), DEFAULT_ENTRY_POINT.to_string()]
}

fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect()
}

const fn default_check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

const fn default_startup_delay_secs() -> u64 {
    DEFAULT_STARTUP_DELAY_SECS
}

const fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

const fn default_poll_tick_secs() -> u64 {
    DEFAULT_POLL_TICK_SECS
}

const fn default_reload_settle_secs() -> u64 {
    DEFAULT_RELOAD_SETTLE_SECS
}

const fn default_reload_timeout_secs() -> u64 {
    DEFAULT_RELOAD_TIMEOUT_SECS
}

const fn default_true() -> bool {
    true
}
