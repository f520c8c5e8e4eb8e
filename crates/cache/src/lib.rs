#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Cache layout and staged-state tracking for dopamine
//!
//! Content-addressed recipe directories keyed by (package, version,
//! revision), flag files whose mtimes carry readiness between stages, and
//! the advisory lock discipline shared with other tools reading the
//! cache.

mod flag;
mod layout;
mod lock;
mod state;

pub use flag::FlagFile;
pub use layout::{DopHome, WorkDirs, DOP_HOME_ENV, DOP_REGISTRY_ENV};
pub use lock::CacheLock;
pub use state::RecipeState;
