//! Supervision of the external device-transfer engine.
//!
//! The engine is a separate executable. The shell never talks its protocol;
//! it launches the process and releases it for a device type at shutdown.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use mtpdock_core::DeviceType;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{LifecycleError, Result};

/// How long a disposed engine gets to exit.
pub const DEFAULT_DISPOSE_GRACE: Duration = Duration::from_secs(3);

/// Controller for the device-transfer engine.
#[async_trait]
pub trait EngineController: Send + Sync {
    /// Releases engine resources held for `device_type`.
    async fn dispose(&self, device_type: DeviceType) -> Result<()>;
}

/// Supervises the engine as a child process.
pub struct ProcessEngineSupervisor {
    program: PathBuf,
    args: Vec<String>,
    grace: Duration,
    child: Mutex<Option<Child>>,
}

impl std::fmt::Debug for ProcessEngineSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessEngineSupervisor")
            .field("program", &self.program)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl ProcessEngineSupervisor {
    /// Creates a supervisor for the engine at `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            grace: DEFAULT_DISPOSE_GRACE,
            child: Mutex::new(None),
        }
    }

    /// Sets the engine's command-line arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Starts the engine unless it is already running. Returns its pid.
    pub async fn launch(&self) -> Result<Option<u32>> {
        let mut guard = self.child.lock().await;

        if let Some(child) = guard.as_mut() {
            if child.try_wait()?.is_none() {
                return Ok(child.id());
            }
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LifecycleError::Engine(format!("{}: {e}", self.program.display())))?;

        let pid = child.id();
        info!(program = %self.program.display(), ?pid, "Device engine launched");
        *guard = Some(child);
        Ok(pid)
    }

    /// Whether the engine process is alive.
    pub async fn is_running(&self) -> bool {
        let mut guard = self.child.lock().await;
        match guard.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

#[async_trait]
impl EngineController for ProcessEngineSupervisor {
    async fn dispose(&self, device_type: DeviceType) -> Result<()> {
        if device_type != DeviceType::Mtp {
            return Ok(());
        }

        let Some(mut child) = self.child.lock().await.take() else {
            debug!("No device engine to dispose");
            return Ok(());
        };

        if let Some(status) = child.try_wait()? {
            debug!(%status, "Device engine had already exited");
            return Ok(());
        }

        child.start_kill()?;
        match tokio::time::timeout(self.grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!(%device_type, %status, "Device engine disposed");
                Ok(())
            }
            Ok(Err(e)) => Err(LifecycleError::Engine(e.to_string())),
            Err(_) => Err(LifecycleError::Engine(format!(
                "engine did not exit within {:?}",
                self.grace
            ))),
        }
    }
}
