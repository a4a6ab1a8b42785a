//! Update configuration and notices.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the shell handles updates for this run.
///
/// Derived from settings once at startup; changes take effect on next launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Check for updates after startup.
    pub auto_check_enabled: bool,
    /// Download an available update without asking.
    pub auto_download_enabled: bool,
    /// Consider pre-release versions.
    pub allow_prerelease: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            auto_check_enabled: true,
            auto_download_enabled: true,
            allow_prerelease: false,
        }
    }
}

/// A newer release found by an update check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNotice {
    /// New version, without a leading `v`.
    pub version: String,
    /// Release page URL.
    pub release_url: String,
    /// Platform asset download URL, if one matched.
    pub download_url: Option<String>,
    /// Asset filename.
    pub asset_name: Option<String>,
    /// Whether this is a pre-release.
    pub prerelease: bool,
    /// Local path once the asset has been downloaded.
    pub downloaded: Option<PathBuf>,
}

impl UpdateNotice {
    /// Converts the notice into the message sent to the UI.
    pub fn to_ui_message(&self) -> crate::UiMessage {
        crate::UiMessage::UpdateAvailable {
            version: self.version.clone(),
            release_url: self.release_url.clone(),
            downloaded: self.downloaded.clone(),
        }
    }
}
