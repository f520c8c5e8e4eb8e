//! Build and staging error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum BuildError {
    #[error("build step failed: {step}: {message}")]
    StepFailed { step: String, message: String },

    #[error("build step exited with status {status}: {step}")]
    StepStatus { step: String, status: i32 },

    #[error("missing tool for language {lang} in profile {profile}")]
    MissingTool { lang: String, profile: String },

    #[error("tool probe failed for {tool}: {message}")]
    ToolProbe { tool: String, message: String },

    #[error("archive error: {message}")]
    Archive { message: String },

    #[error("source fetch failed: {message}")]
    SourceFetch { message: String },

    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("staging is disabled for this recipe")]
    StagingDisabled,
}
