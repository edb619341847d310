//! Integration test suite for component-updater
//!
//! End-to-end tests that drive the updater against a mock release registry
//! (wiremock) and a temporary live tree. They run quickly and need no network.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the `component-updater` binary
//! - **fetch**: artifact downloads
//! - **install_flow**: full update cycles through the installer
//! - **release_client**: registry responses and artifact selection
//! - **scheduler**: retry policy and cancellation over real cycles
//! - **update_cycle**: version guard, failures and notifications


mod fetch;
mod install_flow;
mod release_client;
mod scheduler;
mod update_cycle;
