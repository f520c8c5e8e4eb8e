//! Recipe loading and validation error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum RecipeError {
    #[error("{path}: recipe file not found")]
    NotFound { path: String },

    #[error("{path}: recipe parse error: {message}")]
    Parse { path: String, message: String },

    #[error("{path}: package recipe must define a build stage and a source")]
    MissingBuild { path: String },

    #[error("{path}: package recipe must define a source")]
    MissingSource { path: String },

    #[error("{path}: light recipe must declare at least one dependency")]
    LightWithoutDependencies { path: String },

    #[error("{path}: light recipe must not define {field}")]
    LightWithBuildField { path: String, field: String },

    #[error("{path}: invalid field {field}: {message}")]
    InvalidField {
        path: String,
        field: String,
        message: String,
    },
}
