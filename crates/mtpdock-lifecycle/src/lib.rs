//! MtpDock Lifecycle - Process and window lifecycle for the MtpDock shell.
//!
//! This crate provides:
//!
//! - The single-instance lock and second-instance notification
//! - The [`Orchestrator`] dispatch loop that owns window state
//! - Device hot-plug monitoring
//! - Supervision of the external device-transfer engine
//! - Background tasks (update check, log cleanup) with captured outcomes
//!
//! The UI itself lives behind [`WindowHost`]; everything here is headless.

pub mod engine;
pub mod error;
pub mod event;
pub mod instance;
pub mod monitor;
pub mod orchestrator;
pub mod tasks;
pub mod update;
pub mod window;

pub use engine::{EngineController, ProcessEngineSupervisor};
pub use error::{LifecycleError, Result};
pub use event::{EventReceiver, EventSender, LifecycleEvent};
pub use instance::{notify_running_instance, InstanceLock};
pub use monitor::{DeviceMonitor, UsbPollMonitor};
pub use orchestrator::{
    Collaborators, Control, Orchestrator, OrchestratorConfig, Platform, ShutdownReport,
};
pub use tasks::{BackgroundTask, TaskOutcome, TaskReport};
pub use update::{run_update_check, UpdateChecker};
pub use window::{WindowHost, WindowOptions, WindowState};
