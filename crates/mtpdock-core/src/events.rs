//! Hot-plug events and UI boundary messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Whether a device was attached or detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotplugKind {
    /// A device was plugged in.
    Attach,
    /// A device was unplugged.
    Detach,
}

impl HotplugKind {
    /// Returns the event name used on the UI boundary.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attach => "attach",
            Self::Detach => "detach",
        }
    }
}

impl std::fmt::Display for HotplugKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A device attach/detach notification from the OS-level monitor.
///
/// The descriptor is opaque to the shell and forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotplugEvent {
    pub device: serde_json::Value,
    pub kind: HotplugKind,
}

impl HotplugEvent {
    /// Creates an attach event.
    pub fn attach(device: serde_json::Value) -> Self {
        Self {
            device,
            kind: HotplugKind::Attach,
        }
    }

    /// Creates a detach event.
    pub fn detach(device: serde_json::Value) -> Self {
        Self {
            device,
            kind: HotplugKind::Detach,
        }
    }

    /// Converts the event into the message sent to the UI.
    pub fn to_ui_message(&self) -> UiMessage {
        UiMessage::UsbHotplug {
            device: self.device.to_string(),
            event_name: self.kind,
        }
    }
}

/// One-way messages from the shell to the UI. No acknowledgement is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UiMessage {
    /// A device was attached or detached. `device` is the JSON-encoded descriptor.
    UsbHotplug {
        device: String,
        event_name: HotplugKind,
    },

    /// The OS theme changed while the app theme follows it.
    NativeThemeUpdated { should_use_dark_colors: bool },

    /// A newer release is available.
    UpdateAvailable {
        version: String,
        release_url: String,
        downloaded: Option<PathBuf>,
    },
}

impl UiMessage {
    /// Returns the message kind as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UsbHotplug { .. } => "usbHotplug",
            Self::NativeThemeUpdated { .. } => "nativeThemeUpdated",
            Self::UpdateAvailable { .. } => "updateAvailable",
        }
    }
}
