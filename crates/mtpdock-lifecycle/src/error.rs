//! Lifecycle error types.

use thiserror::Error;

/// Errors raised by lifecycle handlers and collaborators.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The window host rejected a command.
    #[error("window host error: {0}")]
    Window(String),

    /// The hot-plug monitor failed.
    #[error("device monitor error: {0}")]
    Monitor(String),

    /// The device-transfer engine failed.
    #[error("engine error: {0}")]
    Engine(String),

    /// The single-instance lock could not be taken or queried.
    #[error("instance lock error: {0}")]
    Lock(String),

    /// An update check or download failed.
    #[error("update error: {0}")]
    Update(String),

    /// Housekeeping left files it should have removed.
    #[error("cleanup error: {0}")]
    Cleanup(String),

    /// The event loop is gone.
    #[error("event channel closed")]
    ChannelClosed,
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;
