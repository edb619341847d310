//! File system helpers for installation trees.

pub mod atomic;
pub mod dirs;

pub use atomic::atomic_write;
pub use dirs::{copy_dir, ensure_dir, ensure_parent_dir, remove_dir_all, sibling_path};
