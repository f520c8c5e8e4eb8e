#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core types for the dopamine package manager
//!
//! Version specifications, package/dependency declarations, languages,
//! and availability locations shared by every other crate.

mod lang;
mod location;
mod package;
mod version;

pub use lang::Lang;
pub use location::{AvailVersion, Location};
pub use package::{validate_name, DepSpec, OptionValue, Options};
pub use version::VersionSpec;

// The underlying version type is the semver crate's; re-exported so
// downstream crates agree on a single definition.
pub use semver::{Prerelease, Version};
