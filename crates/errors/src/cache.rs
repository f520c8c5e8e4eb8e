//! Recipe cache error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum CacheError {
    #[error("could not acquire lock on {path}: {message}")]
    LockFailed { path: String, message: String },

    #[error("corrupt revision directory {path}: {message}")]
    CorruptRevision { path: String, message: String },

    #[error("cache entry not found: {path}")]
    EntryNotFound { path: String },

    #[error("invalid flag file {path}: {message}")]
    InvalidFlag { path: String, message: String },

    #[error("invalid state file {path}: {message}")]
    InvalidState { path: String, message: String },
}
