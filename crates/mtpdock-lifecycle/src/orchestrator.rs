//! The lifecycle orchestrator.
//!
//! One dispatch loop consumes [`LifecycleEvent`]s and maps each to a single
//! window-state transition or relay. Handlers never run concurrently. A
//! handler error is logged at the dispatch boundary and the loop carries on.

use std::sync::Arc;
use std::time::Duration;

use mtpdock_core::{DeviceInfoProvider, DeviceType, HotplugEvent, UiMessage, UpdateConfig};
use mtpdock_profile::{BootVerdict, SettingsStore};
use tracing::{debug, error, info, trace};

use crate::engine::EngineController;
use crate::error::Result;
use crate::event::{self, EventReceiver, EventSender, LifecycleEvent};
use crate::monitor::DeviceMonitor;
use crate::tasks::{self, BackgroundTask, TaskReport};
use crate::update::{run_update_check, UpdateChecker};
use crate::window::{WindowHost, WindowOptions, WindowState};

/// Delay before the first update check, to stay clear of startup IO.
pub const DEFAULT_UPDATE_WARMUP: Duration = Duration::from_secs(5);

/// How long shutdown waits for background tasks.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Platform behaviour the orchestrator depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Apps stay alive with no windows open (macOS dock).
    pub keeps_running_without_windows: bool,
}

impl Platform {
    /// Behaviour of the platform this binary was built for.
    pub fn current() -> Self {
        Self {
            keeps_running_without_windows: cfg!(target_os = "macos"),
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

/// Orchestrator settings, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub verdict: BootVerdict,
    pub platform: Platform,
    pub window: WindowOptions,
    pub update: UpdateConfig,
    pub update_warmup: Duration,
    pub shutdown_timeout: Duration,
}

impl OrchestratorConfig {
    /// Creates a config with defaults for the given boot verdict.
    pub fn new(verdict: BootVerdict) -> Self {
        Self {
            verdict,
            platform: Platform::current(),
            window: WindowOptions::default(),
            update: UpdateConfig::default(),
            update_warmup: DEFAULT_UPDATE_WARMUP,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Sets platform behaviour.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Sets main window options.
    pub fn with_window(mut self, window: WindowOptions) -> Self {
        self.window = window;
        self
    }

    /// Sets the update configuration.
    pub fn with_update(mut self, update: UpdateConfig) -> Self {
        self.update = update;
        self
    }

    /// Sets the delay before the update check.
    pub fn with_update_warmup(mut self, warmup: Duration) -> Self {
        self.update_warmup = warmup;
        self
    }

    /// Sets how long shutdown waits for background tasks.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// External collaborators the orchestrator drives.
pub struct Collaborators {
    pub host: Box<dyn WindowHost>,
    pub monitor: Box<dyn DeviceMonitor>,
    pub engine: Arc<dyn EngineController>,
    /// `None` when updates are not supported for this install.
    pub updater: Option<Arc<dyn UpdateChecker>>,
    pub settings: SettingsStore,
    pub device_info: Arc<dyn DeviceInfoProvider>,
}

/// What the loop does after a handler ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit(i32),
}

/// Result of running the lifecycle loop to completion.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub exit_code: i32,
    pub tasks: Vec<TaskReport>,
}

/// Owns the window state and relays events to the UI.
pub struct Orchestrator {
    config: OrchestratorConfig,
    host: Box<dyn WindowHost>,
    monitor: Box<dyn DeviceMonitor>,
    engine: Arc<dyn EngineController>,
    updater: Option<Arc<dyn UpdateChecker>>,
    settings: SettingsStore,
    device_info: Arc<dyn DeviceInfoProvider>,
    window: WindowState,
    ready: bool,
    quitting: bool,
    events: EventSender,
    tasks: Vec<BackgroundTask>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("verdict", &self.config.verdict)
            .field("window", &self.window)
            .field("ready", &self.ready)
            .field("quitting", &self.quitting)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator and the receiver its loop will consume.
    pub fn new(config: OrchestratorConfig, parts: Collaborators) -> (Self, EventReceiver) {
        let (events, receiver) = event::channel();

        let orchestrator = Self {
            config,
            host: parts.host,
            monitor: parts.monitor,
            engine: parts.engine,
            updater: parts.updater,
            settings: parts.settings,
            device_info: parts.device_info,
            window: WindowState::Uncreated,
            ready: false,
            quitting: false,
            events,
            tasks: Vec::new(),
        };

        (orchestrator, receiver)
    }

    /// Returns a sender for producers of lifecycle events.
    pub fn sender(&self) -> EventSender {
        self.events.clone()
    }

    /// Returns the current window state.
    pub fn window_state(&self) -> WindowState {
        self.window
    }

    /// Whether shutdown has begun.
    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    /// Tracks a background task so shutdown reports its outcome.
    pub fn track(&mut self, task: BackgroundTask) {
        self.tasks.push(task);
    }

    /// Runs one handler, isolating any failure.
    pub fn dispatch(&mut self, event: LifecycleEvent) -> Control {
        let name = event.name();
        trace!(event = name, "Dispatching lifecycle event");

        let result = if self.config.verdict.is_bootable() {
            self.handle(event)
        } else {
            self.handle_recovery(event)
        };

        match result {
            Ok(control) => control,
            Err(e) => {
                let device = self.device_info.device_info();
                error!(
                    event = name,
                    error = %e,
                    device_model = device.model.as_deref().unwrap_or("none"),
                    device_manufacturer = device.manufacturer.as_deref().unwrap_or("none"),
                    "Lifecycle handler failed"
                );
                Control::Continue
            }
        }
    }

    /// Consumes events until a handler asks to exit, then drains background tasks.
    ///
    /// The orchestrator holds a sender of its own, so the channel stays open
    /// and only a handler returning [`Control::Exit`] ends the loop.
    pub async fn run(mut self, mut events: EventReceiver) -> ShutdownReport {
        info!(verdict = %self.config.verdict, "Lifecycle loop started");

        let mut exit_code = 0;
        while let Some(event) = events.recv().await {
            if let Control::Exit(code) = self.dispatch(event) {
                exit_code = code;
                break;
            }
        }

        self.finish(exit_code).await
    }

    async fn finish(mut self, exit_code: i32) -> ShutdownReport {
        let pending = std::mem::take(&mut self.tasks);
        let reports = tasks::drain(pending, self.config.shutdown_timeout).await;
        info!(exit_code, "Lifecycle loop finished");

        ShutdownReport {
            exit_code,
            tasks: reports,
        }
    }

    fn handle(&mut self, event: LifecycleEvent) -> Result<Control> {
        match event {
            LifecycleEvent::Ready => self.on_ready(),
            LifecycleEvent::WindowClosed => Ok(self.on_window_closed()),
            LifecycleEvent::SecondInstance => self.on_second_instance(),
            LifecycleEvent::Activate => self.on_activate(),
            LifecycleEvent::Hotplug(hotplug) => self.on_hotplug(hotplug),
            LifecycleEvent::ThemeUpdated { dark } => self.on_theme_updated(dark),
            LifecycleEvent::UpdateAvailable(notice) => self.relay(notice.to_ui_message()),
            LifecycleEvent::BeforeQuit => Ok(self.quit()),
        }
    }

    /// The not-bootable branch: recovery window only, exit when it closes.
    fn handle_recovery(&mut self, event: LifecycleEvent) -> Result<Control> {
        match event {
            LifecycleEvent::Ready => {
                info!("Profile not bootable, showing recovery window");
                self.host.show_recovery_window()?;
                Ok(Control::Continue)
            }
            LifecycleEvent::WindowClosed | LifecycleEvent::BeforeQuit => {
                self.quitting = true;
                Ok(Control::Exit(0))
            }
            other => {
                debug!(event = other.name(), "Ignored in recovery mode");
                Ok(Control::Continue)
            }
        }
    }

    fn on_ready(&mut self) -> Result<Control> {
        if self.ready {
            debug!("Duplicate ready signal ignored");
            return Ok(Control::Continue);
        }
        self.ready = true;

        // a missing window must not keep monitoring or update checks off
        if let Err(e) = self.create_window() {
            error!(error = %e, "Failed to create main window");
        }
        self.schedule_update_check();
        self.monitor.start(self.events.clone())?;

        Ok(Control::Continue)
    }

    fn on_window_closed(&mut self) -> Control {
        self.window = WindowState::Destroyed;

        if self.quitting || !self.config.platform.keeps_running_without_windows {
            return self.quit();
        }

        debug!("Window closed, staying alive until reactivated");
        Control::Continue
    }

    fn on_second_instance(&mut self) -> Result<Control> {
        if !self.window.exists() {
            return Ok(Control::Continue);
        }

        if self.host.is_minimized() {
            self.host.restore()?;
        }
        self.host.focus()?;

        Ok(Control::Continue)
    }

    fn on_activate(&mut self) -> Result<Control> {
        if !self.window.exists() && !self.quitting {
            self.create_window()?;
        }
        Ok(Control::Continue)
    }

    fn on_hotplug(&mut self, hotplug: HotplugEvent) -> Result<Control> {
        debug!(kind = %hotplug.kind, "USB hot-plug event");
        self.relay(hotplug.to_ui_message())
    }

    fn on_theme_updated(&mut self, dark: bool) -> Result<Control> {
        if !self.settings.theme_mode().follows_os() {
            return Ok(Control::Continue);
        }

        self.relay(UiMessage::NativeThemeUpdated {
            should_use_dark_colors: dark,
        })
    }

    /// Sends a message if a window exists; drops it otherwise.
    fn relay(&mut self, message: UiMessage) -> Result<Control> {
        if !self.window.exists() {
            trace!(kind = message.kind(), "No window, dropping UI message");
            return Ok(Control::Continue);
        }

        self.host.send(message)?;
        Ok(Control::Continue)
    }

    fn create_window(&mut self) -> Result<()> {
        if self.window.exists() {
            return Ok(());
        }

        self.host.create_main_window(&self.config.window)?;
        self.window = WindowState::Created;
        info!(minimized = self.config.window.start_minimized, "Main window created");
        Ok(())
    }

    fn schedule_update_check(&mut self) {
        let Some(checker) = self.updater.clone() else {
            debug!("Updates not supported for this install");
            return;
        };

        let config = self.config.update;
        if !config.auto_check_enabled {
            debug!("Automatic update checks disabled");
            return;
        }

        let delay = self.config.update_warmup;
        let events = self.events.clone();
        debug!(?delay, "Update check scheduled");

        self.tasks.push(BackgroundTask::spawn_cancellable(
            "update-check",
            async move {
                tokio::time::sleep(delay).await;
                run_update_check(checker.as_ref(), config, &events).await
            },
        ));
    }

    /// Stops monitoring, then releases the engine, then marks quitting.
    fn quit(&mut self) -> Control {
        if self.quitting {
            return Control::Exit(0);
        }
        info!("Shutting down");

        self.monitor.stop();

        let engine = self.engine.clone();
        self.tasks.push(BackgroundTask::spawn("engine-dispose", async move {
            engine.dispose(DeviceType::Mtp).await.map_err(|e| {
                error!(error = %e, "Failed to dispose device engine");
                e
            })
        }));

        self.quitting = true;
        Control::Exit(0)
    }
}
