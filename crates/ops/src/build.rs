//! The build operation
//!
//! Loads the recipe, resolves (or reuses) the dependency DAG, writes the
//! lock file, then drives every package bottom-up to the requested
//! stage.

use crate::context::Context;
use dop_errors::Error;
use dop_recipe::Recipe;
use dop_resolver::{is_fresh, prepare, read_lock, write_lock, LOCK_FILE};
use dop_stager::{build_dag, BuildConfig, StageKind};
use dop_types::Options;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of a build operation
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub package: String,
    pub version: String,
    pub revision: String,
    pub build_id: String,
    /// Install prefix, or the archive for [`StageKind::Archive`] targets
    pub target_path: PathBuf,
    /// Resolved packages, the root included
    pub packages: usize,
}

/// Build the recipe at `recipe_dir` up to `target`.
///
/// A lock file newer than the recipe is reused as-is; otherwise the DAG
/// is resolved afresh and the lock rewritten.
///
/// # Errors
///
/// Recipe, resolution, and staging errors surface unchanged.
pub async fn build(
    ctx: &mut Context,
    recipe_dir: &Path,
    options: Options,
    target: StageKind,
) -> Result<BuildReport, Error> {
    let recipe = Recipe::load_from_dir(recipe_dir)?;
    let lock_path = recipe_dir.join(LOCK_FILE);

    let mut dag = if is_fresh(&lock_path, recipe.path())? {
        debug!(lock = %lock_path.display(), "lock file is fresh, reusing");
        read_lock(&lock_path)?
    } else {
        let dag = prepare(
            &recipe,
            &ctx.profile,
            &mut ctx.service,
            ctx.heuristics.clone(),
        )
        .await?;
        write_lock(&dag, &lock_path)?;
        info!(lock = %lock_path.display(), "lock file written");
        dag
    };

    let config = BuildConfig::new(ctx.profile.clone()).with_options(options);
    let build_id = build_dag(
        &recipe,
        &mut dag,
        &mut ctx.service,
        &config,
        target,
        &ctx.cancel,
    )
    .await?;

    let packages = dag.packs().filter(|(_, p)| p.resolved_node.is_some()).count();
    let root_info = dag
        .pack(dag.root())
        .resolved_node
        .and_then(|node| dag.node(node).build_info.clone());
    let target_path = match (target, root_info) {
        (StageKind::Archive, Some(info)) => {
            // the archive sits next to the install prefix
            info.install_dir
                .parent()
                .map_or(info.install_dir.clone(), Path::to_path_buf)
                .join(format!("{}-{}.tar.xz", recipe.name(), recipe.version()))
        }
        (_, Some(info)) => info.install_dir,
        (_, None) => recipe_dir.to_path_buf(),
    };

    info!(
        package = recipe.name(),
        version = %recipe.version(),
        build_id = %build_id,
        "build complete"
    );
    Ok(BuildReport {
        package: recipe.name().to_string(),
        version: recipe.version().to_string(),
        revision: recipe.revision().to_string(),
        build_id: build_id.as_str().to_string(),
        target_path,
        packages,
    })
}
