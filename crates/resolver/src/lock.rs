//! Lock file serialization (`dop.lock`)
//!
//! Canonical JSON carrying the heuristics and, per package, the full
//! candidate list with retained nodes and their outbound edges. Unknown
//! keys survive a rewrite; deserialize-then-reserialize is byte-stable.

use crate::dag::{DepDag, NodeId, PackId};
use crate::heuristics::Heuristics;
use dop_errors::{Error, ParseError};
use dop_types::{AvailVersion, Lang, Location, Version, VersionSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Supported lock format version
pub const LOCK_VERSION: i64 = 1;

/// Lock file name next to the recipe
pub const LOCK_FILE: &str = "dop.lock";

/// Resolution status of one retained version entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    /// The version the pack resolves to
    Resolved,
    /// Retained node still satisfying every edge
    Compatible,
    /// Known version without a usable node
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockDependency {
    pub name: String,
    pub spec: VersionSpec,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockVersion {
    pub version: Version,
    pub location: Location,
    pub status: LockStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub langs: BTreeSet<Lang>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<LockDependency>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockPackage {
    pub name: String,
    pub versions: Vec<LockVersion>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The whole lock document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockFile {
    #[serde(rename = "dopamine-lock-ver")]
    pub version: i64,
    pub heuristics: Heuristics,
    pub packages: Vec<LockPackage>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Serialize a DAG to its lock document.
#[must_use]
pub fn dag_to_lock(dag: &DepDag) -> LockFile {
    let packages = dag
        .packs()
        .map(|(pack_id, pack)| LockPackage {
            name: pack.name.clone(),
            versions: pack
                .all_versions
                .iter()
                .map(|avail| lock_version(dag, pack_id, avail))
                .collect(),
            extra: serde_json::Map::new(),
        })
        .collect();

    LockFile {
        version: LOCK_VERSION,
        heuristics: dag.heuristics.clone(),
        packages,
        extra: serde_json::Map::new(),
    }
}

fn lock_version(dag: &DepDag, pack_id: PackId, avail: &AvailVersion) -> LockVersion {
    let node_id = dag.find_node(pack_id, avail);
    let status = node_status(dag, pack_id, node_id);

    let (revision, langs, dependencies) = match (status, node_id) {
        (LockStatus::Removed, _) | (_, None) => (None, BTreeSet::new(), Vec::new()),
        (_, Some(node_id)) => {
            let node = dag.node(node_id);
            let deps = node
                .down_edges
                .iter()
                .map(|edge_id| {
                    let edge = dag.edge(*edge_id);
                    LockDependency {
                        name: dag.pack(edge.down).name.clone(),
                        spec: edge.spec.clone(),
                        extra: serde_json::Map::new(),
                    }
                })
                .collect();
            (node.revision.clone(), node.langs.clone(), deps)
        }
    };

    LockVersion {
        version: avail.version.clone(),
        location: avail.location,
        status,
        revision,
        langs,
        dependencies,
        extra: serde_json::Map::new(),
    }
}

fn node_status(dag: &DepDag, pack_id: PackId, node_id: Option<NodeId>) -> LockStatus {
    let Some(node_id) = node_id else {
        return LockStatus::Removed;
    };
    let pack = dag.pack(pack_id);
    if pack.resolved_node == Some(node_id) {
        return LockStatus::Resolved;
    }
    let version = &dag.node(node_id).version;
    let compatible = pack
        .up_edges
        .iter()
        .all(|edge| dag.edge(*edge).spec.matches(version));
    if compatible {
        LockStatus::Compatible
    } else {
        LockStatus::Removed
    }
}

/// Rebuild a DAG from its lock document.
///
/// # Errors
///
/// `ParseError::UnsupportedLockVersion` on a format version mismatch.
pub fn lock_to_dag(lock: &LockFile) -> Result<DepDag, Error> {
    if lock.version != LOCK_VERSION {
        return Err(ParseError::UnsupportedLockVersion {
            found: lock.version,
            supported: LOCK_VERSION,
        }
        .into());
    }

    let mut dag = DepDag::new(lock.heuristics.clone());

    // First pass: packs, candidate lists, retained nodes.
    for package in &lock.packages {
        let pack = dag.get_or_add_pack(&package.name);
        for entry in &package.versions {
            dag.pack_mut(pack)
                .all_versions
                .push(AvailVersion::new(entry.version.clone(), entry.location));
            if entry.status == LockStatus::Removed {
                continue;
            }
            let node = dag.add_node(
                pack,
                entry.version.clone(),
                entry.location,
                entry.revision.clone(),
                entry.langs.clone(),
            );
            if entry.status == LockStatus::Resolved {
                dag.pack_mut(pack).resolved_node = Some(node);
            }
        }
    }

    // Second pass: edges.
    for package in &lock.packages {
        let pack = dag
            .pack_by_name(&package.name)
            .ok_or_else(|| Error::internal("pack vanished between passes"))?;
        for entry in &package.versions {
            let avail = AvailVersion::new(entry.version.clone(), entry.location);
            let Some(node) = dag.find_node(pack, &avail) else {
                continue;
            };
            for dep in &entry.dependencies {
                let down = dag.get_or_add_pack(&dep.name);
                dag.add_edge(node, down, dep.spec.clone());
            }
        }
    }

    let root = dag.packs().next().map(|(root, _)| root);
    if let Some(root) = root {
        dag.set_root(root);
    }
    Ok(dag)
}

/// Render a lock document as canonical pretty JSON.
///
/// # Errors
///
/// Serialization failures only.
pub fn to_json(lock: &LockFile) -> Result<String, Error> {
    let mut text = serde_json::to_string_pretty(lock)?;
    text.push('\n');
    Ok(text)
}

/// Parse a lock document.
///
/// # Errors
///
/// `ParseError::InvalidLock` with the source location when available.
pub fn from_json(text: &str) -> Result<LockFile, Error> {
    serde_json::from_str(text).map_err(|e| ParseError::lock_json(&e).into())
}

/// Write the lock file for a DAG.
///
/// # Errors
///
/// Serialization or I/O failures.
pub fn write_lock(dag: &DepDag, path: &Path) -> Result<(), Error> {
    let text = to_json(&dag_to_lock(dag))?;
    std::fs::write(path, text).map_err(|e| Error::io_with_path(&e, path))?;
    Ok(())
}

/// Read a lock file back into a DAG.
///
/// # Errors
///
/// I/O and parse failures.
pub fn read_lock(path: &Path) -> Result<DepDag, Error> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(&e, path))?;
    lock_to_dag(&from_json(&text)?)
}

/// The DAG is fresh while the lock is newer than the recipe file.
///
/// # Errors
///
/// Metadata failures other than a missing lock file.
pub fn is_fresh(lock_path: &Path, recipe_path: &Path) -> Result<bool, Error> {
    let lock_mtime = match std::fs::metadata(lock_path) {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io_with_path(&e, lock_path)),
    };
    let recipe_mtime = std::fs::metadata(recipe_path)
        .map_err(|e| Error::io_with_path(&e, recipe_path))?
        .modified()?;
    Ok(lock_mtime > recipe_mtime)
}
