#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! High-level operations for the dopamine package manager
//!
//! The orchestration layer between interface code and the specialized
//! crates: an explicit [`Context`] carries the cache layout, dependency
//! service, and registry client through each operation.

mod build;
mod context;
mod publish;
mod query;

pub use build::{build, BuildReport};
pub use context::{Context, ContextBuilder};
pub use publish::publish;
pub use query::{package_info, search_packages};

// The stage a build drives to is part of this crate's API surface
pub use dop_stager::{PublishReport, StageKind};
