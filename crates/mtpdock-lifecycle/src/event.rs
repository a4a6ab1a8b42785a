//! Inbound lifecycle events.

use mtpdock_core::{HotplugEvent, UpdateNotice};
use tokio::sync::mpsc;

/// Signals consumed by the orchestrator's dispatch loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The host is ready to show windows.
    Ready,
    /// The window was closed by the user or the host.
    WindowClosed,
    /// Another launch collided with the instance lock.
    SecondInstance,
    /// The host asked for a window (e.g. dock icon click).
    Activate,
    /// A device was attached or detached.
    Hotplug(HotplugEvent),
    /// The OS theme changed.
    ThemeUpdated { dark: bool },
    /// A background update check found a newer release.
    UpdateAvailable(UpdateNotice),
    /// The process is about to quit.
    BeforeQuit,
}

impl LifecycleEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::WindowClosed => "window-closed",
            Self::SecondInstance => "second-instance",
            Self::Activate => "activate",
            Self::Hotplug(_) => "hotplug",
            Self::ThemeUpdated { .. } => "theme-updated",
            Self::UpdateAvailable(_) => "update-available",
            Self::BeforeQuit => "before-quit",
        }
    }
}

/// Sending half of the lifecycle event channel.
pub type EventSender = mpsc::UnboundedSender<LifecycleEvent>;

/// Receiving half of the lifecycle event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<LifecycleEvent>;

/// Creates a lifecycle event channel.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
