//! DAG preparation: from a root recipe to a resolved dependency graph
//!
//! The preparer walks dependency declarations depth-first, consulting a
//! [`DepProvider`] for availability and recipes. Whenever a later edge
//! grows a pack's candidate set, the heuristic pick is re-selected and
//! the walk continues from the new pick; the previous nodes stay in the
//! graph and serialize as compatible or removed.

use crate::dag::{DepDag, NodeId, PackId};
use crate::heuristics::Heuristics;
use crate::DepProvider;
use dop_errors::{DepError, Error};
use dop_profile::Profile;
use dop_recipe::Recipe;
use dop_types::{AvailVersion, DepSpec, Location};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Availability fetched once per package name
type Known = HashMap<String, Vec<AvailVersion>>;

/// Build and resolve the dependency DAG of `recipe`.
///
/// # Errors
///
/// `DepError::NoSuchPackage` / `NoSuchVersion` when a dependency cannot
/// be satisfied anywhere, `UnsatisfiableConstraints` when edges
/// contradict each other, `CyclicDependency` on a cycle; provider errors
/// surface unchanged.
pub async fn prepare<S: DepProvider>(
    recipe: &Recipe,
    profile: &Profile,
    service: &mut S,
    heuristics: Heuristics,
) -> Result<DepDag, Error> {
    let mut dag = DepDag::new(heuristics);
    let root = dag.get_or_add_pack(recipe.name());
    dag.set_root(root);

    let root_avail = AvailVersion::new(recipe.version().clone(), Location::Cache);
    dag.pack_mut(root).all_versions.push(root_avail);
    let root_node = dag.add_node(
        root,
        recipe.version().clone(),
        Location::Cache,
        Some(recipe.revision().to_string()),
        recipe.langs().clone(),
    );
    dag.pack_mut(root).resolved_node = Some(root_node);

    let mut known = Known::new();
    let mut path = vec![recipe.name().to_string()];
    visit_deps(
        &mut dag,
        root_node,
        recipe.dependencies(profile),
        profile,
        service,
        &mut known,
        &mut path,
    )
    .await?;

    debug!(
        packs = dag.packs().count(),
        resolved = dag.is_resolved_fully(),
        "dependency DAG prepared"
    );
    Ok(dag)
}

/// Recursive step; boxed because async recursion needs a pinned future.
fn visit_deps<'a, S: DepProvider>(
    dag: &'a mut DepDag,
    up_node: NodeId,
    deps: Vec<DepSpec>,
    profile: &'a Profile,
    service: &'a mut S,
    known: &'a mut Known,
    path: &'a mut Vec<String>,
) -> Pin<Box<dyn Future<Output = Result<(), Error>> + 'a>> {
    Box::pin(async move {
        for dep in deps {
            if path.contains(&dep.name) {
                let mut chain = path.clone();
                chain.push(dep.name.clone());
                return Err(DepError::CyclicDependency { chain }.into());
            }

            let pack = dag.get_or_add_pack(&dep.name);
            let available = fetch_known(service, known, dag, &dep.name).await?;
            if available.is_empty() {
                return Err(DepError::NoSuchPackage {
                    name: dep.name.clone(),
                }
                .into());
            }

            let matching: Vec<AvailVersion> = available
                .iter()
                .filter(|av| dep.spec.matches(&av.version))
                .cloned()
                .collect();
            if matching.is_empty() {
                return Err(DepError::NoSuchVersion {
                    name: dep.name.clone(),
                    spec: dep.spec.to_string(),
                }
                .into());
            }

            union_versions(dag, pack, matching);
            dag.add_edge(up_node, pack, dep.spec.clone());

            let candidates = constrained_candidates(dag, pack);
            if candidates.is_empty() {
                let reason = dag
                    .pack(pack)
                    .up_edges
                    .iter()
                    .map(|e| dag.edge(*e).spec.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(DepError::UnsatisfiableConstraints {
                    name: dep.name.clone(),
                    reason,
                }
                .into());
            }

            let pick = dag
                .heuristics
                .choose_version(&candidates)
                .ok_or_else(|| Error::internal("empty candidate list after constraint check"))?;

            let already_resolved_to_pick = dag
                .pack(pack)
                .resolved_node
                .is_some_and(|node| dag.node(node).avail() == pick);
            if already_resolved_to_pick {
                continue;
            }

            if let Some(existing) = dag.find_node(pack, &pick) {
                // Re-selection onto a node visited earlier: its subtree
                // is already in the graph.
                dag.pack_mut(pack).resolved_node = Some(existing);
                continue;
            }

            let node = if pick.location == Location::System {
                dag.add_node(
                    pack,
                    pick.version.clone(),
                    pick.location,
                    None,
                    std::collections::BTreeSet::new(),
                )
            } else {
                let dep_recipe = service.recipe(&dep.name, &pick, None).await?;
                let node = dag.add_node(
                    pack,
                    pick.version.clone(),
                    pick.location,
                    Some(dep_recipe.revision().to_string()),
                    dep_recipe.langs().clone(),
                );
                dag.pack_mut(pack).resolved_node = Some(node);
                path.push(dep.name.clone());
                visit_deps(
                    dag,
                    node,
                    dep_recipe.dependencies(profile),
                    profile,
                    service,
                    known,
                    path,
                )
                .await?;
                path.pop();
                node
            };
            dag.pack_mut(pack).resolved_node = Some(node);
        }
        Ok(())
    })
}

/// Query the provider once per name, filtered by the system policy.
async fn fetch_known<'a, S: DepProvider>(
    service: &mut S,
    known: &'a mut Known,
    dag: &DepDag,
    name: &str,
) -> Result<&'a Vec<AvailVersion>, Error> {
    if !known.contains_key(name) {
        let mut versions = service.available_versions(name).await?;
        if !dag.heuristics.allow_system_for(name) {
            versions.retain(|av| av.location != Location::System);
        }
        known.insert(name.to_string(), versions);
    }
    Ok(&known[name])
}

/// Merge new candidates into a pack's sorted, deduplicated version list.
fn union_versions(dag: &mut DepDag, pack: PackId, candidates: Vec<AvailVersion>) {
    let versions = &mut dag.pack_mut(pack).all_versions;
    versions.extend(candidates);
    versions.sort();
    versions.dedup();
}

/// Versions of the pack satisfying every edge pointing at it.
fn constrained_candidates(dag: &DepDag, pack: PackId) -> Vec<AvailVersion> {
    let pack_ref = dag.pack(pack);
    pack_ref
        .all_versions
        .iter()
        .filter(|av| {
            pack_ref
                .up_edges
                .iter()
                .all(|edge| dag.edge(*edge).spec.matches(&av.version))
        })
        .cloned()
        .collect()
}
