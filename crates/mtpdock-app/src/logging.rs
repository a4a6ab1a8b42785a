//! Logging setup.
//!
//! Logs go to the active log file through a non-blocking writer. Stdout is the
//! UI channel, so console output always goes to stderr.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ShellConfig;

/// Filter directive for a log level: our crates at `level`, dependencies at warn.
pub fn filter_directive(level: &str) -> String {
    format!("mtpdock={level},warn")
}

/// Opens the active log file for appending. Rotation is handled at startup,
/// never by the appender.
pub fn file_appender(log_file: &Path) -> Result<RollingFileAppender, InitError> {
    let dir = log_file.parent().unwrap_or_else(|| Path::new("."));
    let stem = log_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mtpdock");
    let suffix = log_file
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("log");

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(stem)
        .filename_suffix(suffix)
        .build(dir)
}

/// Initializes logging. Keep the returned guard alive until exit.
pub fn init_logging(config: &ShellConfig) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&config.log_level)));

    match file_appender(&config.paths.log_file) {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            if config.console_log {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();
            }

            tracing::info!(file = %config.paths.log_file.display(), "Logging to file");
            Some(guard)
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();

            tracing::warn!(error = %e, "File logging unavailable, using stderr only");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("debug"), "mtpdock=debug,warn");
        assert!(EnvFilter::try_new(filter_directive("trace")).is_ok());
    }

    #[test]
    fn test_file_appender_appends_to_active_log() {
        let dir = TempDir::new().unwrap();
        let log_file = dir.path().join("mtpdock.log");
        std::fs::write(&log_file, "earlier\n").unwrap();

        let mut appender = file_appender(&log_file).unwrap();
        appender.write_all(b"later\n").unwrap();
        appender.flush().unwrap();

        let content = std::fs::read_to_string(&log_file).unwrap();
        assert_eq!(content, "earlier\nlater\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_file_appender_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let log_file = dir.path().join("logs").join("mtpdock.log");

        let mut appender = file_appender(&log_file).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        assert!(log_file.is_file());
    }
}
