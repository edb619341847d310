//! Test utilities for the updater.
//!
//! Shared fixtures for unit and integration tests: a live tree builder, a
//! release archive builder, tree snapshots for byte-for-byte comparisons, and
//! scripted host collaborators.
//!
//! # Example
//!
//! ```rust,no_run
//! use component_updater::test_utils::{LiveTree, ReleaseArchive, snapshot};
//!
//! let tree = LiveTree::new("ble_bridge", "1.0.0").unwrap();
//! let before = snapshot(tree.live_root());
//! let zip = ReleaseArchive::plugin("ble_bridge", "2.0.0").into_bytes();
//! # let _ = (before, zip);
//! ```

pub mod fixtures;
pub mod host;

pub use fixtures::{LiveTree, ReleaseArchive, snapshot};
pub use host::{RecordingNotifier, ScriptedReloader};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays
/// off.
///
/// ```bash
/// RUST_LOG=component_updater=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
