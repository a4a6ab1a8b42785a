//! Log rotation and retention.
//!
//! The active log is rotated by size into `<stem>-YYYY-MM-DD.log`. Retention
//! only reads the first `YYYY-MM` token of a rotated name and treats it as the
//! first day of that month. Files from the current month are never deleted,
//! whatever the threshold.

use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{ProfileError, Result};

/// Default retention for rotated logs, in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 60;

/// Active log size that triggers rotation.
pub const DEFAULT_MAX_ACTIVE_LOG_BYTES: u64 = 5 * 1024 * 1024;

static MONTH_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}").expect("month token pattern is valid"));

/// Age in days beyond which a rotated log file is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionThreshold(NonZeroU32);

impl RetentionThreshold {
    /// Creates a threshold. Fails unless `days` is positive.
    pub fn from_days(days: i64) -> Result<Self> {
        u32::try_from(days)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(ProfileError::InvalidRetention(days))
    }

    /// Returns the threshold in days.
    pub fn days(&self) -> i64 {
        i64::from(self.0.get())
    }
}

impl Default for RetentionThreshold {
    fn default() -> Self {
        Self(NonZeroU32::new(DEFAULT_RETENTION_DAYS).unwrap_or(NonZeroU32::MIN))
    }
}

/// What a retention pass did with each entry in the log directory.
#[derive(Debug, Clone, Default)]
pub struct RotationReport {
    /// Files deleted for being past the threshold.
    pub deleted: Vec<PathBuf>,
    /// Dated files still within the threshold.
    pub retained: Vec<PathBuf>,
    /// Entries without a parsable date token, or not regular files.
    pub skipped: Vec<PathBuf>,
    /// Files that were eligible but could not be deleted.
    pub failed: Vec<(PathBuf, String)>,
}

/// Extracts the first `YYYY-MM` token of a file name as the first of that month.
pub fn month_token(file_name: &str) -> Option<NaiveDate> {
    let token = MONTH_TOKEN.find(file_name)?.as_str();
    let (year, month) = token.split_once('-')?;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

/// Deletes rotated logs in `log_dir` whose month token is at least
/// `threshold` days before `today`.
///
/// Entries whose name starts with `active_log_name` (case-insensitive) are
/// never touched. A failed deletion is recorded and does not stop the pass.
pub fn clean_rotation_files(
    log_dir: &Path,
    active_log_name: &str,
    threshold: RetentionThreshold,
    today: NaiveDate,
) -> RotationReport {
    let mut report = RotationReport::default();

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %log_dir.display(), error = %e, "Cannot list log directory");
            return report;
        }
    };

    let active_prefix = active_log_name.to_lowercase();

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            report.skipped.push(path);
            continue;
        };

        if name.to_lowercase().starts_with(&active_prefix) {
            continue;
        }

        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            report.skipped.push(path);
            continue;
        }

        let Some(dated) = month_token(&name) else {
            debug!(file = %name, "No date token in log file name, keeping it");
            report.skipped.push(path);
            continue;
        };

        let same_month = dated.year() == today.year() && dated.month() == today.month();
        let age_days = today.signed_duration_since(dated).num_days();
        if same_month || age_days < threshold.days() {
            report.retained.push(path);
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(file = %name, age_days, "Deleted rotated log file");
                report.deleted.push(path);
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Failed to delete rotated log file");
                report.failed.push((path, e.to_string()));
            }
        }
    }

    if !report.deleted.is_empty() {
        info!(
            deleted = report.deleted.len(),
            threshold_days = threshold.days(),
            "Cleaned up rotated log files"
        );
    }

    report
}

/// Rotates the active log once it grows past `max_bytes`.
///
/// The current file is renamed to `<stem>-YYYY-MM-DD.log` (with a numeric
/// suffix if that name is taken) and an empty active log is recreated.
/// Returns the rotated path, or `None` when no rotation was needed.
pub fn rotate_active_log(
    log_file: &Path,
    max_bytes: u64,
    today: NaiveDate,
) -> Result<Option<PathBuf>> {
    let size = match fs::metadata(log_file) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ProfileError::io(log_file, e)),
    };

    if size <= max_bytes {
        return Ok(None);
    }

    let target = rotated_name(log_file, today);
    fs::rename(log_file, &target).map_err(|e| ProfileError::io(log_file, e))?;
    fs::File::create(log_file).map_err(|e| ProfileError::io(log_file, e))?;

    info!(from = %log_file.display(), to = %target.display(), size, "Rotated active log file");
    Ok(Some(target))
}

fn rotated_name(log_file: &Path, today: NaiveDate) -> PathBuf {
    let dir = log_file.parent().unwrap_or_else(|| Path::new("."));
    let stem = log_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mtpdock");
    let date = format!(
        "{:04}-{:02}-{:02}",
        today.year(),
        today.month(),
        today.day()
    );

    let mut candidate = dir.join(format!("{stem}-{date}.log"));
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}-{date}-{n}.log"));
        n += 1;
    }
    candidate
}
