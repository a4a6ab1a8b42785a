//! MtpDock Profile - Per-user profile area on disk.
//!
//! This crate owns the on-disk profile layout for the MtpDock shell. It handles:
//!
//! - Resolving profile paths once per process
//! - Boot verification: creating missing directories and files, removing the
//!   legacy previous-profile directory, and producing a [`BootVerdict`]
//! - Active log rotation and date-based retention of rotated logs
//! - Read-only access to persisted settings
//!
//! # Example
//!
//! ```no_run
//! use mtpdock_profile::{BootVerifier, ProfilePaths};
//!
//! let paths = ProfilePaths::default_paths().unwrap();
//! let verifier = BootVerifier::new(paths);
//!
//! if verifier.boot().verdict.is_bootable() {
//!     let report = verifier.clean_rotation_files();
//!     println!("removed {} old log files", report.deleted.len());
//! }
//! ```

pub mod boot;
pub mod error;
pub mod paths;
pub mod rotation;
pub mod settings;

pub use boot::{BootFailure, BootOutcome, BootStep, BootVerdict, BootVerifier, InitReport};
pub use error::{ProfileError, Result};
pub use paths::ProfilePaths;
pub use rotation::{
    rotate_active_log, RetentionThreshold, RotationReport, DEFAULT_MAX_ACTIVE_LOG_BYTES,
    DEFAULT_RETENTION_DAYS,
};
pub use settings::{Settings, SettingsStore};
