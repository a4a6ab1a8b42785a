//! MtpDock Core - Shared domain types.
//!
//! This crate holds the types that cross crate boundaries in the MtpDock shell:
//!
//! - Hot-plug events produced by the device monitor
//! - Messages relayed to the UI boundary
//! - Device type and device info query interface
//! - Update configuration and update notices
//! - Theme preference

pub mod device;
pub mod events;
pub mod theme;
pub mod update;

pub use device::{DeviceInfo, DeviceInfoProvider, DeviceState, DeviceType};
pub use events::{HotplugEvent, HotplugKind, UiMessage};
pub use theme::{ParseThemeModeError, ThemeMode};
pub use update::{UpdateConfig, UpdateNotice};
