//! Read-only access to persisted settings.
//!
//! The settings file is a JSON object written by the UI. The shell only reads
//! a handful of keys; an empty or missing file means "all defaults".

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mtpdock_core::{ThemeMode, UpdateConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ProfileError, Result};

/// Settings the shell reads at startup and on theme changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enable_auto_update_check: bool,
    pub enable_background_auto_update: bool,
    pub enable_prerelease_updates: bool,
    pub app_theme_mode: ThemeMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_auto_update_check: true,
            enable_background_auto_update: true,
            enable_prerelease_updates: false,
            app_theme_mode: ThemeMode::Auto,
        }
    }
}

fn is_bool(object: &Map<String, Value>, key: &str, expected: bool) -> bool {
    object.get(key).and_then(Value::as_bool) == Some(expected)
}

impl Settings {
    /// Reads known keys from a settings object.
    ///
    /// Each key falls back on its own: update checks and background downloads
    /// stay on unless exactly `false`, pre-releases need exactly `true`, and an
    /// unknown theme name means `auto`.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let theme = object
            .get("appThemeMode")
            .and_then(Value::as_str)
            .and_then(|name| name.parse().ok())
            .unwrap_or_default();

        Self {
            enable_auto_update_check: !is_bool(object, "enableAutoUpdateCheck", false),
            enable_background_auto_update: !is_bool(object, "enableBackgroundAutoUpdate", false),
            enable_prerelease_updates: is_bool(object, "enablePrereleaseUpdates", true),
            app_theme_mode: theme,
        }
    }

    /// Derives the update configuration for this run.
    pub fn update_config(&self) -> UpdateConfig {
        UpdateConfig {
            auto_check_enabled: self.enable_auto_update_check,
            auto_download_enabled: self.enable_background_auto_update,
            allow_prerelease: self.enable_prerelease_updates,
        }
    }
}

/// Reads the settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Creates a store reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the settings file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the settings file.
    pub fn try_load(&self) -> Result<Settings> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => return Err(ProfileError::io(&self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(Settings::default());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Object(object) => Ok(Settings::from_object(&object)),
            other => Err(ProfileError::Config(format!(
                "settings must be a JSON object, found {other}"
            ))),
        }
    }

    /// Reads the settings file, falling back to defaults on any error.
    pub fn load(&self) -> Settings {
        self.try_load().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Unreadable settings, using defaults");
            Settings::default()
        })
    }

    /// Returns the current theme preference, re-reading the file.
    pub fn theme_mode(&self) -> ThemeMode {
        self.load().app_theme_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_and_empty_files_use_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings"));
        assert_eq!(store.try_load().unwrap(), Settings::default());

        fs::write(store.path(), "  \n").unwrap();
        assert_eq!(store.try_load().unwrap(), Settings::default());
    }

    #[test]
    fn test_reads_known_keys_and_ignores_others() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings"));
        fs::write(
            store.path(),
            r#"{
                "enableAutoUpdateCheck": false,
                "enableBackgroundAutoUpdate": false,
                "enablePrereleaseUpdates": true,
                "appThemeMode": "dark",
                "hideHiddenFiles": true
            }"#,
        )
        .unwrap();

        let settings = store.load();
        assert_eq!(
            settings.update_config(),
            UpdateConfig {
                auto_check_enabled: false,
                auto_download_enabled: false,
                allow_prerelease: true,
            }
        );
        assert_eq!(store.theme_mode(), ThemeMode::Dark);
    }

    #[test]
    fn test_bad_key_does_not_reset_valid_keys() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings"));
        fs::write(
            store.path(),
            r#"{
                "appThemeMode": "dark",
                "enableAutoUpdateCheck": null,
                "enableBackgroundAutoUpdate": "no",
                "enablePrereleaseUpdates": 1
            }"#,
        )
        .unwrap();

        let settings = store.try_load().unwrap();
        assert_eq!(settings.app_theme_mode, ThemeMode::Dark);
        assert!(settings.enable_auto_update_check);
        assert!(settings.enable_background_auto_update);
        assert!(!settings.enable_prerelease_updates);
    }

    #[test]
    fn test_unknown_theme_means_auto() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings"));
        fs::write(
            store.path(),
            r#"{"appThemeMode":"system","enableAutoUpdateCheck":false}"#,
        )
        .unwrap();

        let settings = store.try_load().unwrap();
        assert_eq!(settings.app_theme_mode, ThemeMode::Auto);
        assert!(!settings.enable_auto_update_check);
    }

    #[test]
    fn test_non_object_settings_rejected() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings"));
        fs::write(store.path(), "[1, 2]").unwrap();

        assert!(matches!(store.try_load(), Err(ProfileError::Config(_))));
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings"));
        fs::write(store.path(), "{not json").unwrap();

        assert!(store.try_load().is_err());
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_theme_mode_is_reread() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings"));
        assert_eq!(store.theme_mode(), ThemeMode::Auto);

        fs::write(store.path(), r#"{"appThemeMode":"light"}"#).unwrap();
        assert_eq!(store.theme_mode(), ThemeMode::Light);
    }
}
