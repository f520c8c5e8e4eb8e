//! Dependency resolution error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum DepError {
    #[error("no such package: {name}")]
    NoSuchPackage { name: String },

    #[error("no version of {name} satisfies {spec}")]
    NoSuchVersion { name: String, spec: String },

    #[error("no such revision of {name}-{version}: {revision}")]
    NoSuchRevision {
        name: String,
        version: String,
        revision: String,
    },

    #[error("cyclic dependency: {}", chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    #[error("unsatisfiable constraints on {name}: {reason}")]
    UnsatisfiableConstraints { name: String, reason: String },

    #[error("language {lang} is not supported by profile {profile}")]
    UnsupportedLang { lang: String, profile: String },
}
