//! Dependency DAG: packages, version nodes, and edges
//!
//! Packs, nodes, and edges live in arenas indexed by small id newtypes;
//! edges keep ids in both directions, so upward navigation never extends
//! a lifetime. The graph is built by [`crate::prepare`] and consumed by
//! the traversals here.

use crate::heuristics::Heuristics;
use dop_errors::{DepError, Error};
use dop_types::{AvailVersion, Lang, Location, Version, VersionSpec};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;

/// Index of a [`DagPack`] in its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackId(pub(crate) usize);

/// Index of a [`DagNode`] in its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Index of a [`DagEdge`] in its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub(crate) usize);

/// Build output information hung on a resolved node by the stager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepBuildInfo {
    pub install_dir: PathBuf,
}

/// One package name and everything known about it
#[derive(Debug, Clone)]
pub struct DagPack {
    pub name: String,
    /// Sorted ascending by `(version, location)`, deduplicated
    pub all_versions: Vec<AvailVersion>,
    pub nodes: Vec<NodeId>,
    pub resolved_node: Option<NodeId>,
    pub up_edges: Vec<EdgeId>,
}

impl DagPack {
    fn new(name: String) -> Self {
        Self {
            name,
            all_versions: Vec::new(),
            nodes: Vec::new(),
            resolved_node: None,
            up_edges: Vec::new(),
        }
    }
}

/// One concrete `(version, location)` of a pack
#[derive(Debug, Clone)]
pub struct DagNode {
    pub pack: PackId,
    pub version: Version,
    pub location: Location,
    /// Recipe content fingerprint; present unless the node is a system
    /// package
    pub revision: Option<String>,
    pub langs: BTreeSet<Lang>,
    pub down_edges: Vec<EdgeId>,
    /// Filled by the stager while walking bottom-up
    pub build_info: Option<DepBuildInfo>,
}

impl DagNode {
    #[must_use]
    pub fn avail(&self) -> AvailVersion {
        AvailVersion::new(self.version.clone(), self.location)
    }
}

/// A dependency from a node onto a pack
#[derive(Debug, Clone)]
pub struct DagEdge {
    pub up: NodeId,
    pub down: PackId,
    pub spec: VersionSpec,
}

/// The dependency graph of one root recipe
#[derive(Debug, Clone)]
pub struct DepDag {
    pub(crate) packs: Vec<DagPack>,
    pub(crate) nodes: Vec<DagNode>,
    pub(crate) edges: Vec<DagEdge>,
    pub(crate) by_name: HashMap<String, PackId>,
    pub(crate) root: Option<PackId>,
    pub heuristics: Heuristics,
}

impl DepDag {
    #[must_use]
    pub fn new(heuristics: Heuristics) -> Self {
        Self {
            packs: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            by_name: HashMap::new(),
            root: None,
            heuristics,
        }
    }

    /// The root pack; set by preparation.
    ///
    /// # Panics
    ///
    /// Panics when called on an empty graph.
    #[must_use]
    pub fn root(&self) -> PackId {
        self.root.expect("DAG has no root")
    }

    pub fn set_root(&mut self, pack: PackId) {
        self.root = Some(pack);
    }

    /// Mark `node` as the resolution of `pack`.
    pub fn set_resolved(&mut self, pack: PackId, node: NodeId) {
        self.packs[pack.0].resolved_node = Some(node);
    }

    /// Fetch-or-create the pack for `name`.
    pub fn get_or_add_pack(&mut self, name: &str) -> PackId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = PackId(self.packs.len());
        self.packs.push(DagPack::new(name.to_string()));
        self.by_name.insert(name.to_string(), id);
        id
    }

    #[must_use]
    pub fn pack_by_name(&self, name: &str) -> Option<PackId> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn pack(&self, id: PackId) -> &DagPack {
        &self.packs[id.0]
    }

    pub(crate) fn pack_mut(&mut self, id: PackId) -> &mut DagPack {
        &mut self.packs[id.0]
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &DagNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut DagNode {
        &mut self.nodes[id.0]
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &DagEdge {
        &self.edges[id.0]
    }

    pub fn packs(&self) -> impl Iterator<Item = (PackId, &DagPack)> {
        self.packs.iter().enumerate().map(|(i, p)| (PackId(i), p))
    }

    /// Find the node of `pack` carrying exactly `avail`.
    #[must_use]
    pub fn find_node(&self, pack: PackId, avail: &AvailVersion) -> Option<NodeId> {
        self.pack(pack)
            .nodes
            .iter()
            .copied()
            .find(|id| self.node(*id).avail() == *avail)
    }

    /// Add a node to a pack.
    pub fn add_node(
        &mut self,
        pack: PackId,
        version: Version,
        location: Location,
        revision: Option<String>,
        langs: BTreeSet<Lang>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DagNode {
            pack,
            version,
            location,
            revision,
            langs,
            down_edges: Vec::new(),
            build_info: None,
        });
        self.pack_mut(pack).nodes.push(id);
        id
    }

    /// Insert an edge, appending it to both endpoints.
    pub fn add_edge(&mut self, up: NodeId, down: PackId, spec: VersionSpec) -> EdgeId {
        let id = EdgeId(self.edges.len());
        self.edges.push(DagEdge { up, down, spec });
        self.nodes[up.0].down_edges.push(id);
        self.pack_mut(down).up_edges.push(id);
        id
    }

    /// Whether a node is its pack's resolution.
    #[must_use]
    pub fn is_resolved(&self, node: NodeId) -> bool {
        self.pack(self.node(node).pack).resolved_node == Some(node)
    }

    /// Whether both endpoints of an edge lie on the resolved subgraph.
    #[must_use]
    pub fn edge_on_resolved_path(&self, edge: EdgeId) -> bool {
        let edge = self.edge(edge);
        self.is_resolved(edge.up) && self.pack(edge.down).resolved_node.is_some()
    }

    /// Whether every pack reachable from the root is resolved.
    #[must_use]
    pub fn is_resolved_fully(&self) -> bool {
        self.packs.iter().all(|pack| pack.resolved_node.is_some())
    }

    /// Resolved nodes, root first, in topological order.
    ///
    /// This is the canonical order for information collection; the
    /// reverse is the build execution order.
    ///
    /// # Errors
    ///
    /// Returns `DepError::CyclicDependency` when the resolved subgraph
    /// is not acyclic (should have been rejected at preparation).
    pub fn traverse_top_down_resolved(&self) -> Result<Vec<NodeId>, Error> {
        // Kahn's algorithm over the resolved subgraph
        let resolved: Vec<NodeId> = self
            .packs
            .iter()
            .filter_map(|pack| pack.resolved_node)
            .collect();

        let mut in_degree: HashMap<NodeId, usize> = resolved.iter().map(|id| (*id, 0)).collect();
        for &node_id in &resolved {
            for &edge_id in &self.node(node_id).down_edges {
                let down = self.edge(edge_id).down;
                if let Some(dep_node) = self.pack(down).resolved_node {
                    if let Some(degree) = in_degree.get_mut(&dep_node) {
                        *degree += 1;
                    }
                }
            }
        }

        let mut queue: VecDeque<NodeId> = resolved
            .iter()
            .copied()
            .filter(|id| in_degree[id] == 0)
            .collect();
        let mut order = Vec::with_capacity(resolved.len());

        while let Some(node_id) = queue.pop_front() {
            order.push(node_id);
            for &edge_id in &self.node(node_id).down_edges {
                let down = self.edge(edge_id).down;
                if let Some(dep_node) = self.pack(down).resolved_node {
                    if let Some(degree) = in_degree.get_mut(&dep_node) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dep_node);
                        }
                    }
                }
            }
        }

        if order.len() != resolved.len() {
            return Err(DepError::CyclicDependency {
                chain: self
                    .packs
                    .iter()
                    .filter(|p| {
                        p.resolved_node
                            .is_some_and(|n| !order.contains(&n))
                    })
                    .map(|p| p.name.clone())
                    .collect(),
            }
            .into());
        }
        Ok(order)
    }

    /// Resolved nodes, leaves first.
    ///
    /// # Errors
    ///
    /// See [`DepDag::traverse_top_down_resolved`].
    pub fn traverse_bottom_up_resolved(&self) -> Result<Vec<NodeId>, Error> {
        let mut order = self.traverse_top_down_resolved()?;
        order.reverse();
        Ok(order)
    }

    /// Sorted union of the languages of every resolved node.
    #[must_use]
    pub fn collect_langs(&self) -> BTreeSet<Lang> {
        self.packs
            .iter()
            .filter_map(|pack| pack.resolved_node)
            .flat_map(|node| self.node(node).langs.iter().copied())
            .collect()
    }

    /// Install-dir map `name -> info` over every resolved node that has
    /// build info, for handing to build steps.
    #[must_use]
    pub fn build_infos(&self) -> HashMap<String, DepBuildInfo> {
        self.packs
            .iter()
            .filter_map(|pack| {
                let node = pack.resolved_node?;
                let info = self.node(node).build_info.clone()?;
                Some((pack.name.clone(), info))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn build_linear_dag() -> DepDag {
        // root -> a -> b
        let mut dag = DepDag::new(Heuristics::default());
        let root = dag.get_or_add_pack("root");
        dag.set_root(root);
        let root_node = dag.add_node(root, v("1.0.0"), Location::Cache, None, BTreeSet::new());
        dag.pack_mut(root).resolved_node = Some(root_node);

        let a = dag.get_or_add_pack("pkg-a");
        let a_node = dag.add_node(a, v("1.2.0"), Location::Cache, None, BTreeSet::new());
        dag.pack_mut(a).resolved_node = Some(a_node);
        dag.add_edge(root_node, a, ">=1.0.0".parse().unwrap());

        let b = dag.get_or_add_pack("pkg-b");
        let b_node = dag.add_node(b, v("0.5.0"), Location::System, None, BTreeSet::new());
        dag.pack_mut(b).resolved_node = Some(b_node);
        dag.add_edge(a_node, b, "*".parse().unwrap());

        dag
    }

    #[test]
    fn test_edge_links_both_directions() {
        let dag = build_linear_dag();
        let a = dag.pack_by_name("pkg-a").unwrap();
        assert_eq!(dag.pack(a).up_edges.len(), 1);
        let edge = dag.edge(dag.pack(a).up_edges[0]);
        assert_eq!(dag.node(edge.up).version, v("1.0.0"));
        assert!(dag
            .node(edge.up)
            .down_edges
            .contains(&dag.pack(a).up_edges[0]));
    }

    #[test]
    fn test_top_down_and_bottom_up_orders() {
        let dag = build_linear_dag();
        let down = dag.traverse_top_down_resolved().unwrap();
        let names: Vec<&str> = down
            .iter()
            .map(|id| dag.pack(dag.node(*id).pack).name.as_str())
            .collect();
        assert_eq!(names, vec!["root", "pkg-a", "pkg-b"]);

        let up = dag.traverse_bottom_up_resolved().unwrap();
        let names: Vec<&str> = up
            .iter()
            .map(|id| dag.pack(dag.node(*id).pack).name.as_str())
            .collect();
        assert_eq!(names, vec!["pkg-b", "pkg-a", "root"]);
    }

    #[test]
    fn test_edge_on_resolved_path() {
        let mut dag = build_linear_dag();
        let a = dag.pack_by_name("pkg-a").unwrap();
        assert!(dag.edge_on_resolved_path(dag.pack(a).up_edges[0]));
        dag.pack_mut(a).resolved_node = None;
        assert!(!dag.edge_on_resolved_path(dag.pack(a).up_edges[0]));
    }
}
