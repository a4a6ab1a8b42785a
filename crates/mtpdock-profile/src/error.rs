//! Profile error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in profile operations.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// IO error on a profile path.
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Retention threshold must be a positive number of days.
    #[error("invalid retention threshold: {0} days")]
    InvalidRetention(i64),
}

impl ProfileError {
    /// Wraps an IO error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for profile operations.
pub type Result<T> = std::result::Result<T, ProfileError>;
