//! Device type and device info query interface.
//!
//! The orchestrator never reaches into UI state for device metadata. It asks a
//! [`DeviceInfoProvider`] instead; [`DeviceState`] is the shared in-process
//! implementation that the UI host updates when a device session changes.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Kind of device the transfer engine is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// A phone or camera speaking MTP.
    Mtp,
    /// The local filesystem.
    Local,
}

impl DeviceType {
    /// Returns the device type as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mtp => "mtp",
            Self::Local => "local",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identification reported by the connected MTP device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceInfo {
    pub standard_version: Option<String>,
    #[serde(rename = "MTPVersion")]
    pub mtp_version: Option<String>,
    #[serde(rename = "MTPExtension")]
    pub mtp_extension: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub device_version: Option<String>,
}

impl DeviceInfo {
    /// Returns true if no field is populated.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Query interface for the currently connected device.
pub trait DeviceInfoProvider: Send + Sync {
    /// Returns info for the active device, or an empty value if none.
    fn device_info(&self) -> DeviceInfo;
}

/// Shared, cloneable device state.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    current: Arc<RwLock<Option<DeviceInfo>>>,
}

impl DeviceState {
    /// Creates an empty device state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the connected device.
    pub fn set(&self, info: DeviceInfo) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Some(info);
    }

    /// Forgets the connected device.
    pub fn clear(&self) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = None;
    }
}

impl DeviceInfoProvider for DeviceState {
    fn device_info(&self) -> DeviceInfo {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_state_empty_by_default() {
        let state = DeviceState::new();
        assert!(state.device_info().is_empty());
    }

    #[test]
    fn test_device_state_set_and_clear() {
        let state = DeviceState::new();
        let shared = state.clone();

        state.set(DeviceInfo {
            manufacturer: Some("Samsung".to_string()),
            model: Some("SM-G991B".to_string()),
            ..Default::default()
        });
        assert_eq!(shared.device_info().model.as_deref(), Some("SM-G991B"));

        shared.clear();
        assert!(state.device_info().is_empty());
    }

    #[test]
    fn test_device_info_field_names() {
        let info = DeviceInfo {
            mtp_version: Some("100".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["MTPVersion"], "100");
        assert!(value.get("StandardVersion").is_some());
    }
}
