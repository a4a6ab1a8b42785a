//! MtpDock - desktop shell for MTP file transfer.
//!
//! This crate provides the pieces the `mtpdock` binary wires together:
//!
//! - Command-line arguments and the resolved [`ShellConfig`]
//! - Logging to the active log file
//! - A [`StdioHost`] speaking JSON lines to the renderer
//! - Update checks against GitHub Releases
//! - Startup housekeeping: log retention and the device engine

pub mod config;
pub mod host;
pub mod logging;
pub mod startup;
pub mod updater;

pub use config::{Args, ShellConfig};
pub use host::{forward_signals, HostCommand, HostSignal, StdioHost};
pub use startup::{launch_engine, retention_outcome, spawn_retention};
pub use updater::{updates_supported, GitHubUpdater, UpdateError};
