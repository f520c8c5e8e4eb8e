//! Resolution scenarios against an in-memory provider

use dop_errors::{DepError, Error};
use dop_profile::{Arch, BuildType, HostInfo, Os, Profile};
use dop_recipe::{Recipe, RECIPE_FILE};
use dop_resolver::{
    dag_to_lock, lock_to_dag, prepare, to_json, DepProvider, HeuristicMode, Heuristics,
    LockStatus, SystemPolicy,
};
use dop_types::{AvailVersion, Location, Version};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Provider serving recipes written into a temp directory
struct FakeProvider {
    versions: HashMap<String, Vec<AvailVersion>>,
    recipe_dirs: HashMap<(String, String), PathBuf>,
    tmp: tempfile::TempDir,
}

impl FakeProvider {
    fn new() -> Self {
        Self {
            versions: HashMap::new(),
            recipe_dirs: HashMap::new(),
            tmp: tempfile::tempdir().unwrap(),
        }
    }

    /// Register a package version and write its recipe file.
    fn add_package(
        &mut self,
        name: &str,
        version: &str,
        location: Location,
        deps: &[&str],
    ) {
        let avail = AvailVersion::new(Version::parse(version).unwrap(), location);
        let list = self.versions.entry(name.to_string()).or_default();
        list.push(avail);
        list.sort();

        if location == Location::System {
            return;
        }

        let mut text = format!("name: {name}\nversion: {version}\nlangs: [d]\n");
        if !deps.is_empty() {
            text.push_str("dependencies:\n");
            for dep in deps {
                writeln!(text, "  - {dep}").unwrap();
            }
        }
        text.push_str("source: .\nbuild:\n  - run: [make]\n");

        let dir = self
            .tmp
            .path()
            .join(format!("{name}-{version}-{location}"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(RECIPE_FILE), text).unwrap();
        self.recipe_dirs
            .insert((name.to_string(), version.to_string()), dir);
    }
}

impl DepProvider for FakeProvider {
    async fn available_versions(&mut self, name: &str) -> Result<Vec<AvailVersion>, Error> {
        Ok(self.versions.get(name).cloned().unwrap_or_default())
    }

    async fn recipe(
        &mut self,
        name: &str,
        avail: &AvailVersion,
        _revision: Option<&str>,
    ) -> Result<Recipe, Error> {
        let dir = self
            .recipe_dirs
            .get(&(name.to_string(), avail.version.to_string()))
            .ok_or_else(|| DepError::NoSuchPackage {
                name: name.to_string(),
            })?;
        Recipe::load(&dir.join(RECIPE_FILE), None)
    }
}

fn test_profile() -> Profile {
    Profile::new(
        "default",
        HostInfo {
            os: Os::Linux,
            arch: Arch::X86_64,
        },
        BuildType::Debug,
        BTreeMap::new(),
    )
}

/// Root recipe written to its own directory
fn root_recipe(deps: &[&str]) -> (tempfile::TempDir, Recipe) {
    let dir = tempfile::tempdir().unwrap();
    let mut text = String::from("name: root-pkg\nversion: 1.0.0\nlangs: [d]\n");
    if !deps.is_empty() {
        text.push_str("dependencies:\n");
        for dep in deps {
            writeln!(text, "  - {dep}").unwrap();
        }
    }
    text.push_str("source: .\nbuild:\n  - run: [make]\n");
    std::fs::write(dir.path().join(RECIPE_FILE), text).unwrap();
    let recipe = Recipe::load(&dir.path().join(RECIPE_FILE), None).unwrap();
    (dir, recipe)
}

fn cache_heuristics() -> Heuristics {
    Heuristics::new(HeuristicMode::PreferCache, SystemPolicy::Allow)
}

#[tokio::test]
async fn resolves_linear_chain() {
    let mut provider = FakeProvider::new();
    provider.add_package("pkg-a", "1.0.0", Location::Cache, &["pkg-b >=0.5.0"]);
    provider.add_package("pkg-b", "0.5.0", Location::Cache, &[]);
    let (_dir, recipe) = root_recipe(&["pkg-a ^1.0.0"]);

    let dag = prepare(&recipe, &test_profile(), &mut provider, cache_heuristics())
        .await
        .unwrap();

    assert!(dag.is_resolved_fully());
    let order = dag.traverse_bottom_up_resolved().unwrap();
    let names: Vec<&str> = order
        .iter()
        .map(|id| dag.pack(dag.node(*id).pack).name.as_str())
        .collect();
    assert_eq!(names, vec!["pkg-b", "pkg-a", "root-pkg"]);

    // every node off the root carries a revision
    for id in &order {
        let node = dag.node(*id);
        assert!(node.revision.is_some());
    }
}

#[tokio::test]
async fn picks_highest_matching_in_cache() {
    let mut provider = FakeProvider::new();
    provider.add_package("pkg-a", "1.0.0", Location::Cache, &[]);
    provider.add_package("pkg-a", "1.5.0", Location::Cache, &[]);
    provider.add_package("pkg-a", "2.0.0", Location::Cache, &[]);
    let (_dir, recipe) = root_recipe(&["pkg-a ~>1.0"]);

    let dag = prepare(&recipe, &test_profile(), &mut provider, cache_heuristics())
        .await
        .unwrap();

    let pack = dag.pack_by_name("pkg-a").unwrap();
    let resolved = dag.pack(pack).resolved_node.unwrap();
    assert_eq!(dag.node(resolved).version, Version::new(1, 5, 0));
}

#[tokio::test]
async fn rejects_cycles_with_chain() {
    let mut provider = FakeProvider::new();
    provider.add_package("pkg-a", "1.0.0", Location::Cache, &["root-pkg *"]);
    let (_dir, recipe) = root_recipe(&["pkg-a *"]);

    let err = prepare(&recipe, &test_profile(), &mut provider, cache_heuristics())
        .await
        .unwrap_err();
    match err {
        Error::Dep(DepError::CyclicDependency { chain }) => {
            assert_eq!(chain, vec!["root-pkg", "pkg-a", "root-pkg"]);
        }
        other => panic!("expected cycle, got {other}"),
    }
}

#[tokio::test]
async fn reports_missing_package_and_version() {
    let mut provider = FakeProvider::new();
    provider.add_package("pkg-a", "1.0.0", Location::Cache, &[]);

    let (_dir, recipe) = root_recipe(&["nowhere *"]);
    let err = prepare(&recipe, &test_profile(), &mut provider, cache_heuristics())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Dep(DepError::NoSuchPackage { .. })));

    let mut provider = FakeProvider::new();
    provider.add_package("pkg-a", "1.0.0", Location::Cache, &[]);
    let (_dir, recipe) = root_recipe(&["pkg-a >=2.0.0"]);
    let err = prepare(&recipe, &test_profile(), &mut provider, cache_heuristics())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Dep(DepError::NoSuchVersion { .. })));
}

#[tokio::test]
async fn conflicting_edges_are_unsatisfiable() {
    let mut provider = FakeProvider::new();
    provider.add_package("pkg-a", "1.0.0", Location::Cache, &["pkg-b <2.0.0"]);
    provider.add_package("pkg-b", "1.0.0", Location::Cache, &[]);
    provider.add_package("pkg-b", "2.0.0", Location::Cache, &[]);
    // root wants pkg-b >=2, pkg-a wants pkg-b <2
    let (_dir, recipe) = root_recipe(&["pkg-b >=2.0.0", "pkg-a *"]);

    let err = prepare(&recipe, &test_profile(), &mut provider, cache_heuristics())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Dep(DepError::UnsatisfiableConstraints { .. })
    ));
}

#[tokio::test]
async fn reselects_when_later_edge_narrows() {
    let mut provider = FakeProvider::new();
    provider.add_package("pkg-a", "1.0.0", Location::Cache, &["pkg-c >=1.0.0"]);
    provider.add_package("pkg-b", "1.0.0", Location::Cache, &["pkg-c <2.0.0"]);
    provider.add_package("pkg-c", "1.0.0", Location::Cache, &[]);
    provider.add_package("pkg-c", "2.0.0", Location::Cache, &[]);
    let (_dir, recipe) = root_recipe(&["pkg-a *", "pkg-b *"]);

    let dag = prepare(&recipe, &test_profile(), &mut provider, cache_heuristics())
        .await
        .unwrap();

    let pack = dag.pack_by_name("pkg-c").unwrap();
    let resolved = dag.pack(pack).resolved_node.unwrap();
    assert_eq!(dag.node(resolved).version, Version::new(1, 0, 0));

    // every edge spec holds against the final resolution
    for (_, p) in dag.packs() {
        let Some(node) = p.resolved_node else { continue };
        let version = &dag.node(node).version;
        for edge in &p.up_edges {
            assert!(dag.edge(*edge).spec.matches(version));
        }
    }

    // the abandoned pick survives in the lock as removed
    let lock = dag_to_lock(&dag);
    let pkg_c = lock
        .packages
        .iter()
        .find(|p| p.name == "pkg-c")
        .unwrap();
    let v2 = pkg_c
        .versions
        .iter()
        .find(|v| v.version == Version::new(2, 0, 0))
        .unwrap();
    assert_eq!(v2.status, LockStatus::Removed);
}

#[tokio::test]
async fn system_nodes_have_no_revision() {
    let mut provider = FakeProvider::new();
    provider.add_package("zlib", "1.3.0", Location::System, &[]);
    let (_dir, recipe) = root_recipe(&["zlib *"]);

    let heuristics = Heuristics::new(HeuristicMode::PreferSystem, SystemPolicy::Allow);
    let dag = prepare(&recipe, &test_profile(), &mut provider, heuristics)
        .await
        .unwrap();

    let pack = dag.pack_by_name("zlib").unwrap();
    let node = dag.node(dag.pack(pack).resolved_node.unwrap());
    assert_eq!(node.location, Location::System);
    assert_eq!(node.revision, None);
}

#[tokio::test]
async fn system_disallowed_falls_back() {
    let mut provider = FakeProvider::new();
    provider.add_package("zlib", "2.0.0", Location::System, &[]);
    provider.add_package("zlib", "1.3.0", Location::Cache, &[]);
    let (_dir, recipe) = root_recipe(&["zlib *"]);

    let heuristics = Heuristics::new(HeuristicMode::PreferSystem, SystemPolicy::Disallow);
    let dag = prepare(&recipe, &test_profile(), &mut provider, heuristics)
        .await
        .unwrap();

    let pack = dag.pack_by_name("zlib").unwrap();
    let node = dag.node(dag.pack(pack).resolved_node.unwrap());
    assert_eq!(node.location, Location::Cache);
}

#[tokio::test]
async fn prepared_dag_round_trips_through_lock() {
    let mut provider = FakeProvider::new();
    provider.add_package("pkg-a", "1.0.0", Location::Cache, &[]);
    let (_dir, recipe) = root_recipe(&["pkg-a >=1.0.0"]);

    let dag = prepare(&recipe, &test_profile(), &mut provider, cache_heuristics())
        .await
        .unwrap();

    let lock = dag_to_lock(&dag);
    let text = to_json(&lock).unwrap();
    let rebuilt = lock_to_dag(&dop_resolver::from_json(&text).unwrap()).unwrap();

    assert_eq!(rebuilt.pack(rebuilt.root()).name, "root-pkg");
    let a = rebuilt.pack_by_name("pkg-a").unwrap();
    let node = rebuilt.node(rebuilt.pack(a).resolved_node.unwrap());
    assert_eq!(node.version, Version::new(1, 0, 0));
    assert_eq!(node.location, Location::Cache);
    assert!(node.revision.is_some());

    // language aggregation survives
    assert_eq!(rebuilt.collect_langs(), dag.collect_langs());
}

mod determinism {
    use super::*;
    use proptest::prelude::*;

    fn arb_candidates() -> impl Strategy<Value = Vec<AvailVersion>> {
        proptest::collection::vec(
            ((0u64..5, 0u64..5, 0u64..5), 0u8..3).prop_map(|((ma, mi, pa), loc)| {
                let location = match loc {
                    0 => Location::System,
                    1 => Location::Cache,
                    _ => Location::Network,
                };
                AvailVersion::new(Version::new(ma, mi, pa), location)
            }),
            1..12,
        )
    }

    proptest! {
        #[test]
        fn choose_depends_only_on_sorted_input(candidates in arb_candidates(), mode in 0u8..4) {
            let mode = match mode {
                0 => HeuristicMode::PreferSystem,
                1 => HeuristicMode::PreferCache,
                2 => HeuristicMode::PreferLocal,
                _ => HeuristicMode::PickHighest,
            };
            let heuristics = Heuristics::new(mode, SystemPolicy::Allow);

            let mut sorted = candidates.clone();
            sorted.sort();
            sorted.dedup();

            let mut shuffled = sorted.clone();
            shuffled.reverse();
            shuffled.sort();

            prop_assert_eq!(
                heuristics.choose_version(&sorted),
                heuristics.choose_version(&shuffled)
            );
        }
    }
}
