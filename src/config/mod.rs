//! Configuration management.
//!
//! The updater reads one TOML file (see [`UpdaterConfig`]) whose sections map
//! onto the updater stages: `[source]` for the release registry,
//! `[component]` for the live tree layout, `[schedule]` for the background
//! loop, `[install]` for reload behaviour and `[notify]` for user
//! notifications. The section types live next to the code that consumes them
//! in [`crate::updater::config`].

mod global;

pub use global::UpdaterConfig;
