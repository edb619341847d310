//! Utility modules shared across the updater.
//!
//! - [`fs`]: directory copy/removal, sibling paths and atomic writes
//! - [`backoff`]: delay between retried filesystem operations

pub mod backoff;
pub mod fs;

pub use fs::{atomic_write, copy_dir, ensure_dir, remove_dir_all, sibling_path};
