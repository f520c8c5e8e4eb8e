#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Dependency resolution for the dopamine package manager
//!
//! Builds a dependency DAG from a root recipe by consulting availability
//! across system, cache, and network; selects versions with deterministic
//! heuristics; serializes the result as the `dop.lock` file.

mod dag;
mod heuristics;
mod lock;
mod prepare;
mod service;

pub use dag::{
    DagEdge, DagNode, DagPack, DepBuildInfo, DepDag, EdgeId, NodeId, PackId,
};
pub use heuristics::{HeuristicMode, Heuristics, SystemPolicy};
pub use lock::{
    dag_to_lock, from_json, is_fresh, lock_to_dag, read_lock, to_json, write_lock, LockDependency,
    LockFile, LockPackage, LockStatus, LockVersion, LOCK_FILE, LOCK_VERSION,
};
pub use prepare::prepare;
pub use service::DepService;

use dop_errors::Error;
use dop_recipe::Recipe;
use dop_types::AvailVersion;

/// Source of availability and recipes consulted during DAG preparation
///
/// [`DepService`] is the production implementation; tests substitute
/// in-memory providers.
pub trait DepProvider {
    /// Versions known for `name`, sorted ascending by `(version,
    /// location)`.
    fn available_versions(
        &mut self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Vec<AvailVersion>, Error>>;

    /// The recipe of a non-system availability; `revision` pins a
    /// specific fingerprint.
    fn recipe(
        &mut self,
        name: &str,
        avail: &AvailVersion,
        revision: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Recipe, Error>>;
}
