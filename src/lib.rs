//! Live component updater.
//!
//! Keeps a plugin component's source tree at the latest release published in
//! a GitHub-style release registry, while the host process that loads the
//! component keeps running. New releases are downloaded to a scratch
//! directory, staged next to the live tree, swapped in with renames, and
//! reloaded through a host collaborator; a rejected reload rolls the tree
//! back.
//!
//! # Modules
//!
//! - [`updater`] - the update pipeline and background scheduler
//! - [`config`] - the TOML configuration file
//! - [`cli`] - the `component-updater` command line
//! - [`core`] - error types and user-facing error reporting
//! - [`utils`] - filesystem helpers
//!
//! # Quick Start
//!
//! ```bash
//! cat > ~/.component-updater/config.toml <<'TOML'
//! [source]
//! repository = "acme/ble-bridge"
//!
//! [component]
//! id = "ble_bridge"
//! live_root = "~/.homeassistant/custom_components/ble_bridge"
//!
//! [install]
//! reload_command = ["systemctl", "restart", "home-assistant"]
//! TOML
//!
//! component-updater check
//! component-updater run
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod updater;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
