//! Startup work that must not stop the shell from coming up.

use mtpdock_lifecycle::{BackgroundTask, LifecycleError, ProcessEngineSupervisor, Result};
use mtpdock_profile::{BootVerifier, RotationReport};
use tracing::{info, warn};

/// Launches the device engine. A failure is logged and the shell carries on
/// without it. Returns whether the engine is running.
pub async fn launch_engine(engine: &ProcessEngineSupervisor) -> bool {
    match engine.launch().await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Failed to launch device engine, continuing without it");
            false
        }
    }
}

/// Name the retention task reports under.
pub const RETENTION_TASK: &str = "log-retention";

/// Runs a retention pass on the blocking pool.
pub fn spawn_retention(verifier: BootVerifier) -> BackgroundTask {
    BackgroundTask::spawn_blocking(RETENTION_TASK, move || {
        retention_outcome(&verifier.clean_rotation_files())
    })
}

/// Logs a retention pass. Fails if any expired file is still on disk.
pub fn retention_outcome(report: &RotationReport) -> Result<()> {
    info!(
        deleted = report.deleted.len(),
        retained = report.retained.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Log retention finished"
    );

    if report.failed.is_empty() {
        return Ok(());
    }

    for (path, error) in &report.failed {
        warn!(path = %path.display(), error = %error, "Expired log not deleted");
    }
    Err(LifecycleError::Cleanup(format!(
        "{} of {} expired logs could not be deleted",
        report.failed.len(),
        report.failed.len() + report.deleted.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use mtpdock_core::DeviceType;
    use mtpdock_lifecycle::{tasks, EngineController, TaskOutcome};
    use mtpdock_profile::ProfilePaths;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_engine_does_not_abort_startup() {
        let dir = TempDir::new().unwrap();
        let engine = ProcessEngineSupervisor::new(dir.path().join("no-such-engine"));

        assert!(!launch_engine(&engine).await);
        assert!(!engine.is_running().await);
        engine.dispose(DeviceType::Mtp).await.unwrap();
    }

    #[test]
    fn test_failed_deletions_fail_the_pass() {
        let report = RotationReport {
            deleted: vec![PathBuf::from("logs/mtpdock-2023-01-02.log")],
            failed: vec![(
                PathBuf::from("logs/mtpdock-2023-02-03.log"),
                "permission denied".to_string(),
            )],
            ..Default::default()
        };

        match retention_outcome(&report) {
            Err(LifecycleError::Cleanup(message)) => {
                assert_eq!(message, "1 of 2 expired logs could not be deleted");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_clean_pass_succeeds() {
        let report = RotationReport {
            deleted: vec![PathBuf::from("logs/mtpdock-2023-01-02.log")],
            retained: vec![PathBuf::from("logs/mtpdock-2099-01-02.log")],
            ..Default::default()
        };
        assert!(retention_outcome(&report).is_ok());
    }

    #[tokio::test]
    async fn test_retention_task_reports_completion() {
        let dir = TempDir::new().unwrap();
        let verifier = BootVerifier::new(ProfilePaths::from_root(dir.path().join("profile")));
        assert!(verifier.boot().verdict.is_bootable());

        let expired = verifier.paths().log_dir.join("mtpdock-2020-01-15.log");
        std::fs::write(&expired, "old\n").unwrap();
        let active = verifier.paths().log_file.clone();

        let reports = tasks::drain(vec![spawn_retention(verifier)], Duration::from_secs(5)).await;

        assert_eq!(reports[0].name, RETENTION_TASK);
        assert_eq!(reports[0].outcome, TaskOutcome::Completed);
        assert!(!expired.exists());
        assert!(active.exists());
    }
}
