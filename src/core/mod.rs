//! Core types shared by every stage of the updater.
//!
//! At the moment this is the error system: one strongly-typed error enum per
//! stage ([`CheckError`], [`FetchError`], [`InstallError`]), a top-level
//! [`UpdaterError`] for configuration and command failures, and
//! [`ErrorContext`] / [`user_friendly_error`] for presenting any of them on
//! the command line with a suggestion attached.
//!
//! # Error Handling Pattern
//!
//! ```rust,no_run
//! use component_updater::core::user_friendly_error;
//!
//! fn handle(result: anyhow::Result<()>) {
//!     if let Err(e) = result {
//!         user_friendly_error(e).display();
//!     }
//! }
//! ```

pub mod error;

pub use error::{
    CheckError, ErrorContext, FetchError, InstallError, UpdaterError, user_friendly_error,
};
