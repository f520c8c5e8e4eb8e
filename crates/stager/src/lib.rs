#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Build staging for the dopamine package manager
//!
//! Computes the reproducible build identifier, then drives packages from
//! source through configure, build, install, and archive. Stage
//! completion lives in flag files so re-runs skip what is already up to
//! date.

mod archive;
mod build_id;
mod drive;
mod publish;
mod source;
mod stage;
mod stager;
mod steps;

pub use archive::{create_archive, extract_archive};
pub use build_id::{BuildConfig, BuildId};
pub use drive::build_dag;
pub use publish::{copy_recipe_tree, publish, PublishReport};
pub use source::fetch_source;
pub use stage::{stage_status, StageKind, StageStatus};
pub use stager::{ensure_langs_supported, Stager};
pub use steps::run_steps;
