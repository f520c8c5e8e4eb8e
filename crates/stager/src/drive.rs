//! Building a whole resolved DAG bottom-up
//!
//! Dependencies build before their dependents; each finished node hangs
//! its install prefix on the DAG so dependents find it in their step
//! environment.

use crate::build_id::{BuildConfig, BuildId};
use crate::stage::StageKind;
use crate::stager::{ensure_langs_supported, Stager};
use dop_recipe::Recipe;
use dop_resolver::{DepBuildInfo, DepDag, DepProvider};
use dop_errors::Error;
use dop_types::Location;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Build every resolved node of `dag`, leaves first, then the root up to
/// `root_target`. Returns the root build id.
///
/// System nodes and light recipes need no build and are skipped; their
/// dependents still see everything below them.
///
/// # Errors
///
/// The first failing stage surfaces; completed nodes keep their flags.
pub async fn build_dag<S: DepProvider>(
    root_recipe: &Recipe,
    dag: &mut DepDag,
    service: &mut S,
    config: &BuildConfig,
    root_target: StageKind,
    cancel: &CancellationToken,
) -> Result<BuildId, Error> {
    ensure_langs_supported(config, dag)?;

    let root_node = dag
        .pack(dag.root())
        .resolved_node
        .ok_or_else(|| Error::internal("root pack is not resolved"))?;
    let order = dag.traverse_bottom_up_resolved()?;

    for node_id in order {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let node = dag.node(node_id);
        if node.location == Location::System {
            continue;
        }

        let is_root = node_id == root_node;
        let name = dag.pack(node.pack).name.clone();
        let avail = node.avail();
        let revision = node.revision.clone();

        let dep_recipe;
        let recipe = if is_root {
            root_recipe
        } else {
            dep_recipe = service
                .recipe(&name, &avail, revision.as_deref())
                .await?;
            &dep_recipe
        };

        if recipe.is_light() {
            continue;
        }

        // root options parameterise only the root build
        let mut node_config = BuildConfig::new(config.profile.clone());
        if is_root {
            node_config.options = config.options.clone();
        }

        let build_id = BuildId::compute_scoped(&node_config, dag, node_id)?;
        let target = if is_root { root_target } else { StageKind::Install };

        info!(package = %name, version = %avail.version, build_id = %build_id, "building");
        let stager = Stager::new(recipe, &node_config, build_id, dag.build_infos())?
            .with_cancellation(cancel.clone());
        stager.reach(target).await?;

        dag.node_mut(node_id).build_info = Some(DepBuildInfo {
            install_dir: stager.work().install_dir(),
        });
    }

    let mut root_config = BuildConfig::new(config.profile.clone());
    root_config.options = config.options.clone();
    BuildId::compute_scoped(&root_config, dag, root_node)
}
