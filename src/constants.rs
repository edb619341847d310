//! Global constants used throughout the updater.
//!
//! Timeouts, scheduler defaults, on-disk naming conventions and other
//! values shared by several modules live here so the magic numbers stay
//! discoverable in one place.

use std::time::Duration;

/// Timeout for the release registry metadata request (10 seconds).
pub const REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the whole artifact download (60 seconds).
///
/// Covers connection, headers and the full streamed body.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Write buffer size used while streaming the artifact to disk (8 KiB).
pub const DOWNLOAD_CHUNK_SIZE: usize = 8 * 1024;

/// File name of the downloaded archive inside the scratch directory.
pub const DOWNLOAD_FILE_NAME: &str = "update.zip";

/// How long the host gets to finish a setup already in progress before a
/// reload is abandoned (10 seconds).
pub const HOST_READY_WAIT: Duration = Duration::from_secs(10);

/// Pause between the swap and the reload request so the host observes a
/// settled tree (2 seconds).
pub const DEFAULT_RELOAD_SETTLE_SECS: u64 = 2;

/// Default bound on one reload request (2 minutes). A reload that takes
/// longer is treated as failed and rolled back.
pub const DEFAULT_RELOAD_TIMEOUT_SECS: u64 = 2 * 60;

/// Default interval between regular update checks (24 hours).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default warm-up delay before the first check after startup (60 seconds).
pub const DEFAULT_STARTUP_DELAY_SECS: u64 = 60;

/// Default delay before retrying a failed update (30 minutes).
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 30 * 60;

/// Default number of failed attempts tolerated for one version.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default scheduler poll tick (5 minutes).
pub const DEFAULT_POLL_TICK_SECS: u64 = 5 * 60;

/// Suffix of the best-effort backup copy of the live tree.
pub const BACKUP_SUFFIX: &str = "backup";

/// Suffix of the staging tree prepared before the swap.
pub const STAGING_SUFFIX: &str = "staging";

/// Suffix the previous live tree is renamed to during the swap.
pub const OLD_SUFFIX: &str = "old";

/// Default manifest file name inside the live tree.
pub const DEFAULT_MANIFEST_FILE: &str = "manifest.json";

/// Default entry-point file name inside the live tree.
pub const DEFAULT_ENTRY_POINT: &str = "__init__.py";

/// Default parent directory convention for plugins inside release archives.
pub const DEFAULT_PLUGIN_DIR: &str = "custom_components";

/// Default registry API base.
pub const DEFAULT_REGISTRY_BASE: &str = "https://api.github.com/repos";

/// Default base used to synthesize source-archive URLs.
pub const DEFAULT_SOURCE_ARCHIVE_BASE: &str = "https://github.com";

/// Paths skipped while overlaying a payload onto the staging tree.
pub const DEFAULT_EXCLUDES: &[&str] =
    &["__pycache__", ".git", "venv", "*.backup", "*.staging", "*.pyc", "*.pyo"];

/// Environment variable handed to reload commands.
pub const INSTANCE_ID_ENV: &str = "COMPONENT_INSTANCE_ID";

/// User agent sent with every registry and download request.
pub const USER_AGENT: &str = concat!("component-updater/", env!("CARGO_PKG_VERSION"));

/// Maximum backoff delay between retried filesystem operations (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting backoff delay, doubled on each retry (10ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Attempts made for each rename during rollback.
pub const ROLLBACK_RENAME_ATTEMPTS: u32 = 3;
