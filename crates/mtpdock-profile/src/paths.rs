//! Profile path resolution.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::{ProfileError, Result};

/// Name of the active log file inside the log directory.
pub const ACTIVE_LOG_FILE_NAME: &str = "mtpdock.log";

/// Name of the settings file inside the profile root.
pub const SETTINGS_FILE_NAME: &str = "settings";

/// Legacy profile directory left behind by older releases.
pub const PREVIOUS_PROFILE_DIR_NAME: &str = "previous-profile";

/// Lock file backing the single-instance guard.
pub const INSTANCE_LOCK_FILE_NAME: &str = "instance.lock";

/// File holding the loopback port of the running instance.
pub const INSTANCE_PORT_FILE_NAME: &str = "instance.port";

/// Absolute locations of everything in the profile area.
///
/// Resolved once at process start and passed down; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePaths {
    /// The profile root directory.
    pub root: PathBuf,
    /// Directory holding the active and rotated log files.
    pub log_dir: PathBuf,
    /// The active log file.
    pub log_file: PathBuf,
    /// The persisted settings file.
    pub settings_file: PathBuf,
    /// Legacy profile directory, deleted when found.
    pub previous_profile_dir: PathBuf,
    /// Single-instance lock file.
    pub instance_lock: PathBuf,
    /// Loopback port of the instance holding the lock.
    pub instance_port: PathBuf,
}

impl ProfilePaths {
    /// Get paths for the default per-user profile area.
    pub fn default_paths() -> Result<Self> {
        let dirs = ProjectDirs::from("io", "mtpdock", "MtpDock").ok_or_else(|| {
            ProfileError::Config("Could not determine app data directory".into())
        })?;

        Ok(Self::from_root(dirs.data_dir()))
    }

    /// Get paths for a profile area rooted at `root`.
    ///
    /// A relative root is resolved against the current directory.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = if root.is_relative() {
            std::env::current_dir()
                .map(|cwd| cwd.join(root))
                .unwrap_or_else(|_| root.to_path_buf())
        } else {
            root.to_path_buf()
        };

        let log_dir = root.join("logs");

        Self {
            log_file: log_dir.join(ACTIVE_LOG_FILE_NAME),
            log_dir,
            settings_file: root.join(SETTINGS_FILE_NAME),
            previous_profile_dir: root.join(PREVIOUS_PROFILE_DIR_NAME),
            instance_lock: root.join(INSTANCE_LOCK_FILE_NAME),
            instance_port: root.join(INSTANCE_PORT_FILE_NAME),
            root,
        }
    }

    /// Directories that must exist for the profile to be bootable.
    pub fn required_dirs(&self) -> Vec<&Path> {
        vec![&self.root, &self.log_dir]
    }

    /// Log files that must exist for the profile to be bootable.
    pub fn required_log_files(&self) -> Vec<&Path> {
        vec![&self.log_file]
    }

    /// Every file that must exist for the profile to be bootable.
    pub fn required_files(&self) -> Vec<&Path> {
        let mut files = vec![self.settings_file.as_path()];
        files.extend(self.required_log_files());
        files
    }

    /// File name of the active log, used to tell it apart from rotated logs.
    pub fn log_file_name(&self) -> &str {
        self.log_file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(ACTIVE_LOG_FILE_NAME)
    }
}
