//! Fire-and-forget background work with captured outcomes.
//!
//! Callers never await these tasks for correctness, but their outcomes are
//! kept so they can be logged at exit and inspected in tests.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::Result;

/// How a background task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed(String),
    /// Aborted at shutdown before finishing.
    Cancelled,
    /// Still running when the shutdown deadline passed.
    TimedOut,
    Panicked,
}

impl TaskOutcome {
    /// Returns true if the task finished without error.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Outcome of one named task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub name: &'static str,
    pub outcome: TaskOutcome,
}

/// A spawned task tracked until shutdown.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    handle: JoinHandle<Result<()>>,
    cancel_on_shutdown: bool,
}

impl BackgroundTask {
    /// Spawns a task that shutdown waits for.
    pub fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name,
            handle: tokio::spawn(future),
            cancel_on_shutdown: false,
        }
    }

    /// Spawns a task that shutdown aborts if it has not finished.
    pub fn spawn_cancellable<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name,
            handle: tokio::spawn(future),
            cancel_on_shutdown: true,
        }
    }

    /// Runs blocking work (filesystem cleanup) on the blocking pool.
    pub fn spawn_blocking<F>(name: &'static str, work: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Self {
            name,
            handle: tokio::task::spawn_blocking(work),
            cancel_on_shutdown: false,
        }
    }

    /// Waits up to `timeout` for the task and reports how it ended.
    pub async fn finish(mut self, timeout: Duration) -> TaskReport {
        if self.cancel_on_shutdown && !self.handle.is_finished() {
            self.handle.abort();
        }

        let outcome = match tokio::time::timeout(timeout, &mut self.handle).await {
            Ok(Ok(Ok(()))) => TaskOutcome::Completed,
            Ok(Ok(Err(e))) => TaskOutcome::Failed(e.to_string()),
            Ok(Err(join)) if join.is_cancelled() => TaskOutcome::Cancelled,
            Ok(Err(_)) => TaskOutcome::Panicked,
            Err(_) => {
                self.handle.abort();
                TaskOutcome::TimedOut
            }
        };

        TaskReport {
            name: self.name,
            outcome,
        }
    }
}

/// Finishes every task, sharing one deadline across all of them.
pub async fn drain(tasks: Vec<BackgroundTask>, timeout: Duration) -> Vec<TaskReport> {
    let deadline = Instant::now() + timeout;
    let mut reports = Vec::with_capacity(tasks.len());

    for task in tasks {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let report = task.finish(remaining).await;
        match &report.outcome {
            TaskOutcome::Completed => {
                tracing::debug!(task = report.name, "Background task completed")
            }
            TaskOutcome::Cancelled => {
                tracing::debug!(task = report.name, "Background task cancelled")
            }
            outcome => {
                tracing::warn!(task = report.name, ?outcome, "Background task did not complete")
            }
        }
        reports.push(report);
    }

    reports
}
