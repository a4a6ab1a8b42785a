//! Boot verification of the profile area.
//!
//! [`BootVerifier::initialize`] is best effort: every IO failure is logged and
//! recorded in the returned [`InitReport`] but never propagated, so a single
//! permission error cannot take the process down before logging is set up.
//! [`BootVerifier::verify`] then decides whether the shell may boot normally.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::paths::ProfilePaths;
use crate::rotation::{self, RetentionThreshold, RotationReport};

/// Outcome of verifying the profile area at launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootVerdict {
    /// The profile is complete; start the full application.
    Bootable,
    /// The profile is unusable; start the recovery window only.
    NotBootable,
}

impl BootVerdict {
    /// Returns true for [`BootVerdict::Bootable`].
    pub fn is_bootable(&self) -> bool {
        matches!(self, Self::Bootable)
    }
}

impl From<bool> for BootVerdict {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Bootable
        } else {
            Self::NotBootable
        }
    }
}

impl std::fmt::Display for BootVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bootable => write!(f, "bootable"),
            Self::NotBootable => write!(f, "not bootable"),
        }
    }
}

/// Step of [`BootVerifier::initialize`] that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStep {
    CreateDir,
    CreateSettings,
    CreateLogFile,
    RemovePreviousProfile,
}

/// A recorded, non-fatal failure during initialization.
#[derive(Debug, Clone)]
pub struct BootFailure {
    pub step: BootStep,
    pub path: PathBuf,
    pub error: String,
}

/// What [`BootVerifier::initialize`] did.
#[derive(Debug, Clone, Default)]
pub struct InitReport {
    /// Directories and files that were created.
    pub created: Vec<PathBuf>,
    /// Whether the previous-profile directory was removed.
    pub removed_previous_profile: bool,
    /// Failures that were swallowed.
    pub failures: Vec<BootFailure>,
}

impl InitReport {
    /// Returns true if no step failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, step: BootStep, path: &Path, err: io::Error) {
        warn!(?step, path = %path.display(), error = %err, "Profile initialization step failed");
        self.failures.push(BootFailure {
            step,
            path: path.to_path_buf(),
            error: err.to_string(),
        });
    }
}

/// Result of the full startup check.
#[derive(Debug, Clone)]
pub struct BootOutcome {
    pub verdict: BootVerdict,
    /// True when the fast path succeeded and nothing was initialized.
    pub warm_start: bool,
    /// Present when initialization ran.
    pub report: Option<InitReport>,
}

/// Verifies and repairs the profile area.
#[derive(Debug, Clone)]
pub struct BootVerifier {
    paths: ProfilePaths,
    retention: RetentionThreshold,
}

impl BootVerifier {
    /// Creates a verifier with the default retention threshold.
    pub fn new(paths: ProfilePaths) -> Self {
        Self {
            paths,
            retention: RetentionThreshold::default(),
        }
    }

    /// Sets the log retention threshold.
    pub fn with_retention(mut self, retention: RetentionThreshold) -> Self {
        self.retention = retention;
        self
    }

    /// Returns the profile paths.
    pub fn paths(&self) -> &ProfilePaths {
        &self.paths
    }

    /// Returns the log retention threshold.
    pub fn retention(&self) -> RetentionThreshold {
        self.retention
    }

    /// Decides whether this launch may boot normally.
    ///
    /// Existing installs take the fast path; otherwise the profile is
    /// initialized and then fully verified.
    pub fn boot(&self) -> BootOutcome {
        if self.quick_verify() {
            debug!("Profile quick verification passed");
            return BootOutcome {
                verdict: BootVerdict::Bootable,
                warm_start: true,
                report: None,
            };
        }

        info!(root = %self.paths.root.display(), "Initializing profile area");
        let report = self.initialize();
        let verdict = self.verify();

        BootOutcome {
            verdict,
            warm_start: false,
            report: Some(report),
        }
    }

    /// Creates whatever is missing from the profile area.
    ///
    /// Directories first, then the settings file, then log files, then removal
    /// of the previous-profile directory. Safe to call on every launch.
    pub fn initialize(&self) -> InitReport {
        let mut report = InitReport::default();

        for dir in self.paths.required_dirs() {
            if dir.is_dir() {
                continue;
            }
            // create_dir_all succeeds if another process created it first
            match fs::create_dir_all(dir) {
                Ok(()) => report.created.push(dir.to_path_buf()),
                Err(e) => report.fail(BootStep::CreateDir, dir, e),
            }
        }

        let settings = &self.paths.settings_file;
        if !settings.is_file() {
            match ensure_file(settings) {
                Ok(()) => report.created.push(settings.clone()),
                Err(e) => report.fail(BootStep::CreateSettings, settings, e),
            }
        }

        for file in self.paths.required_log_files() {
            if file.is_file() {
                continue;
            }
            match ensure_file(file) {
                Ok(()) => report.created.push(file.to_path_buf()),
                Err(e) => report.fail(BootStep::CreateLogFile, file, e),
            }
        }

        let previous = &self.paths.previous_profile_dir;
        if previous.exists() {
            match remove_path(previous) {
                Ok(()) => {
                    info!(path = %previous.display(), "Removed previous profile directory");
                    report.removed_previous_profile = true;
                }
                Err(e) => report.fail(BootStep::RemovePreviousProfile, previous, e),
            }
        }

        report
    }

    /// Checks that every required directory and file exists. No side effects.
    pub fn verify(&self) -> BootVerdict {
        let dirs_ok = self.paths.required_dirs().iter().all(|dir| dir.is_dir());
        let files_ok = self.paths.required_files().iter().all(|f| f.is_file());

        BootVerdict::from(dirs_ok && files_ok)
    }

    /// Fast path for warm starts: only checks required files.
    pub fn quick_verify(&self) -> bool {
        self.paths.required_files().iter().all(|f| f.is_file())
    }

    /// Deletes rotated log files older than the retention threshold.
    pub fn clean_rotation_files(&self) -> RotationReport {
        self.clean_rotation_files_at(Local::now().date_naive())
    }

    /// Same as [`Self::clean_rotation_files`] with an explicit "today".
    pub fn clean_rotation_files_at(&self, today: NaiveDate) -> RotationReport {
        rotation::clean_rotation_files(
            &self.paths.log_dir,
            self.paths.log_file_name(),
            self.retention,
            today,
        )
    }
}

/// Creates an empty file unless it already exists. Never truncates.
fn ensure_file(path: &Path) -> io::Result<()> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map(|_| ())
}

/// Removes a file or directory tree, treating "already gone" as success.
fn remove_path(path: &Path) -> io::Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn verifier_in(dir: &TempDir) -> BootVerifier {
        BootVerifier::new(ProfilePaths::from_root(dir.path().join("profile")))
    }

    fn snapshot(root: &Path) -> Vec<PathBuf> {
        fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
            if let Ok(entries) = fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    out.push(path.clone());
                    if path.is_dir() {
                        walk(&path, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(root, &mut out);
        out.sort();
        out
    }

    #[test]
    fn test_initialize_creates_layout() {
        let dir = TempDir::new().unwrap();
        let verifier = verifier_in(&dir);

        let report = verifier.initialize();

        assert!(report.is_success());
        assert!(verifier.paths().log_dir.is_dir());
        assert!(verifier.paths().log_file.is_file());
        assert!(verifier.paths().settings_file.is_file());
        assert_eq!(fs::metadata(&verifier.paths().settings_file).unwrap().len(), 0);
        assert_eq!(verifier.verify(), BootVerdict::Bootable);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let verifier = verifier_in(&dir);

        verifier.initialize();
        let once = snapshot(dir.path());

        let second = verifier.initialize();
        let twice = snapshot(dir.path());

        assert!(second.is_success());
        assert!(second.created.is_empty());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_initialize_keeps_existing_settings() {
        let dir = TempDir::new().unwrap();
        let verifier = verifier_in(&dir);
        verifier.initialize();

        fs::write(&verifier.paths().settings_file, r#"{"appThemeMode":"dark"}"#).unwrap();
        verifier.initialize();

        let content = fs::read_to_string(&verifier.paths().settings_file).unwrap();
        assert_eq!(content, r#"{"appThemeMode":"dark"}"#);
    }

    #[test]
    fn test_initialize_removes_previous_profile() {
        let dir = TempDir::new().unwrap();
        let verifier = verifier_in(&dir);
        let previous = &verifier.paths().previous_profile_dir;
        fs::create_dir_all(previous.join("nested")).unwrap();
        fs::write(previous.join("nested/settings.json"), "{}").unwrap();

        let report = verifier.initialize();

        assert!(report.removed_previous_profile);
        assert!(!previous.exists());
    }

    #[test]
    fn test_remove_path_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        assert!(remove_path(&dir.path().join("gone")).is_ok());
    }

    #[test]
    fn test_verify_detects_external_removal() {
        let dir = TempDir::new().unwrap();
        let verifier = verifier_in(&dir);
        verifier.initialize();

        for path in [
            verifier.paths().log_file.clone(),
            verifier.paths().settings_file.clone(),
        ] {
            verifier.initialize();
            assert!(verifier.verify().is_bootable());
            fs::remove_file(&path).unwrap();
            assert_eq!(verifier.verify(), BootVerdict::NotBootable);
        }

        verifier.initialize();
        fs::remove_dir_all(&verifier.paths().log_dir).unwrap();
        assert_eq!(verifier.verify(), BootVerdict::NotBootable);
    }

    #[test]
    fn test_quick_verify_on_fresh_profile() {
        let dir = TempDir::new().unwrap();
        let verifier = verifier_in(&dir);

        assert!(!verifier.quick_verify());
        verifier.initialize();
        assert!(verifier.quick_verify());
    }

    #[test]
    fn test_boot_fresh_then_warm() {
        let dir = TempDir::new().unwrap();
        let verifier = verifier_in(&dir);

        let fresh = verifier.boot();
        assert!(fresh.verdict.is_bootable());
        assert!(!fresh.warm_start);
        assert!(fresh.report.is_some());

        let warm = verifier.boot();
        assert!(warm.verdict.is_bootable());
        assert!(warm.warm_start);
        assert!(warm.report.is_none());
    }

    #[test]
    fn test_boot_not_bootable_when_root_is_a_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("profile");
        fs::write(&root, "not a directory").unwrap();
        let verifier = BootVerifier::new(ProfilePaths::from_root(&root));

        let outcome = verifier.boot();

        assert_eq!(outcome.verdict, BootVerdict::NotBootable);
        let report = outcome.report.unwrap();
        assert!(!report.is_success());
        assert!(report
            .failures
            .iter()
            .any(|f| f.step == BootStep::CreateDir));
    }
}
