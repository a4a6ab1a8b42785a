//! Window state and the host that renders windows.

use mtpdock_core::UiMessage;

use crate::error::Result;

/// Lifecycle state of the main window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowState {
    /// No window has been created yet.
    #[default]
    Uncreated,
    /// The window exists.
    Created,
    /// The window was closed. A new one may be created on activation.
    Destroyed,
}

impl WindowState {
    /// Returns true if a window currently exists.
    pub fn exists(&self) -> bool {
        matches!(self, Self::Created)
    }
}

/// How the main window is first shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowOptions {
    /// Start minimized instead of maximized and focused.
    pub start_minimized: bool,
}

/// The UI host that owns the actual windows.
///
/// Rendering is entirely the host's business; the orchestrator only issues
/// commands and relays messages through this trait.
pub trait WindowHost: Send {
    /// Creates and shows the main window.
    fn create_main_window(&mut self, options: &WindowOptions) -> Result<()>;

    /// Shows the minimal recovery window used when the profile is not bootable.
    fn show_recovery_window(&mut self) -> Result<()>;

    /// Whether the main window is currently minimized.
    fn is_minimized(&self) -> bool;

    /// Restores the main window from minimized state.
    fn restore(&mut self) -> Result<()>;

    /// Brings the main window to the foreground.
    fn focus(&mut self) -> Result<()>;

    /// Sends a one-way message to the UI.
    fn send(&mut self, message: UiMessage) -> Result<()>;
}
