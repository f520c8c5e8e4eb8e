//! Registry client error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("registry server is not reachable: {host}")]
    ServerDown { host: String },

    #[error("HTTP {code} {reason}{}", .body.as_deref().map(|b| format!(": {b}")).unwrap_or_default())]
    Http {
        code: u16,
        reason: String,
        body: Option<String>,
    },

    #[error("registry API version mismatch: expected {expected}, got {received}")]
    VersionMismatch { expected: String, received: String },

    #[error("no bearer token for registry {host}; log in first")]
    NotLoggedIn { host: String },

    #[error("upload token expired or already used")]
    UploadTokenRejected,

    #[error("invalid registry response: {message}")]
    InvalidResponse { message: String },
}

impl RegistryError {
    /// True for transient failures that a retry may resolve.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ServerDown { .. } => true,
            Self::Http { code, .. } => *code >= 500,
            _ => false,
        }
    }
}
