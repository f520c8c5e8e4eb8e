//! Parsing error types for versions, version specs, and lock files

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid version: {input}")]
    InvalidVersion { input: String },

    #[error("invalid version spec: {input}")]
    InvalidSpec { input: String },

    #[error("invalid lock file{}: {message}", .location.as_deref().map(|l| format!(" at {l}")).unwrap_or_default())]
    InvalidLock {
        message: String,
        location: Option<String>,
    },

    #[error("unsupported lock file version {found} (supported: {supported})")]
    UnsupportedLockVersion { found: i64, supported: i64 },

    #[error("{path}: invalid profile file: {message}")]
    InvalidProfile { path: String, message: String },
}

impl ParseError {
    /// Build an `InvalidLock` from a serde_json error, keeping its location.
    #[must_use]
    pub fn lock_json(err: &serde_json::Error) -> Self {
        let location = if err.line() == 0 {
            None
        } else {
            Some(format!("line {}, column {}", err.line(), err.column()))
        };
        Self::InvalidLock {
            message: err.to_string(),
            location,
        }
    }
}
