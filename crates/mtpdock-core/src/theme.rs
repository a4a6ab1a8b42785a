//! App theme preference.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persisted `appThemeMode` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    /// Follow the OS theme.
    #[default]
    Auto,
    Light,
    Dark,
}

/// Returned when a theme name is not recognized.
#[derive(Debug, Error)]
#[error("unknown theme mode: {0}")]
pub struct ParseThemeModeError(String);

impl ThemeMode {
    /// Returns the mode as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Whether OS theme changes should be relayed to the UI.
    pub fn follows_os(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl std::str::FromStr for ThemeMode {
    type Err = ParseThemeModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(ParseThemeModeError(other.to_string())),
        }
    }
}

impl std::fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_theme_mode() {
        assert_eq!("auto".parse::<ThemeMode>().unwrap(), ThemeMode::Auto);
        assert_eq!(" Dark ".parse::<ThemeMode>().unwrap(), ThemeMode::Dark);
        assert!("sepia".parse::<ThemeMode>().is_err());
    }

    #[test]
    fn test_only_auto_follows_os() {
        assert!(ThemeMode::Auto.follows_os());
        assert!(!ThemeMode::Light.follows_os());
        assert!(!ThemeMode::Dark.follows_os());
    }
}
