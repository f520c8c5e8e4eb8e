//! Reproducible build identifier
//!
//! The build id is the cache key of every artifact: a SHA-1 digest over
//! the profile digest, the build type, every resolved dependency
//! `(name, version, revision)` in top-down topological order, and the
//! recipe options sorted by key. Its 10-character prefix names the
//! on-disk config directory.

use dop_errors::Error;
use dop_profile::Profile;
use dop_resolver::DepDag;
use dop_types::Options;
use sha1::{Digest, Sha1};
use std::fmt;

/// Profile plus recipe options: everything a build is parameterised by
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub profile: Profile,
    pub options: Options,
}

impl BuildConfig {
    #[must_use]
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            options: Options::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }
}

/// 40-hex-character digest identifying a build
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildId(String);

impl BuildId {
    /// Compute the id for `config` over a resolved DAG.
    ///
    /// # Errors
    ///
    /// Returns an error when the resolved subgraph cannot be ordered.
    pub fn compute(config: &BuildConfig, dag: &DepDag) -> Result<Self, Error> {
        let mut hasher = Sha1::new();
        feed(&mut hasher, &config.profile.digest_hash());
        feed(&mut hasher, &config.profile.build_type.to_string());

        for node_id in dag.traverse_top_down_resolved()? {
            let node = dag.node(node_id);
            let pack = dag.pack(node.pack);
            feed(&mut hasher, &pack.name);
            feed(&mut hasher, &node.version.to_string());
            feed(&mut hasher, node.revision.as_deref().unwrap_or_default());
        }

        for (key, value) in &config.options {
            feed(&mut hasher, key);
            feed(&mut hasher, &value.to_string());
        }

        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Compute the id of the sub-build rooted at `from`: only resolved
    /// nodes reachable from it contribute.
    ///
    /// # Errors
    ///
    /// Returns an error when the resolved subgraph cannot be ordered.
    pub fn compute_scoped(
        config: &BuildConfig,
        dag: &DepDag,
        from: dop_resolver::NodeId,
    ) -> Result<Self, Error> {
        let mut reachable = std::collections::HashSet::new();
        let mut stack = vec![from];
        while let Some(node_id) = stack.pop() {
            if !reachable.insert(node_id) {
                continue;
            }
            for edge_id in &dag.node(node_id).down_edges {
                let down = dag.edge(*edge_id).down;
                if let Some(dep) = dag.pack(down).resolved_node {
                    stack.push(dep);
                }
            }
        }

        let mut hasher = Sha1::new();
        feed(&mut hasher, &config.profile.digest_hash());
        feed(&mut hasher, &config.profile.build_type.to_string());

        for node_id in dag.traverse_top_down_resolved()? {
            if !reachable.contains(&node_id) {
                continue;
            }
            let node = dag.node(node_id);
            let pack = dag.pack(node.pack);
            feed(&mut hasher, &pack.name);
            feed(&mut hasher, &node.version.to_string());
            feed(&mut hasher, node.revision.as_deref().unwrap_or_default());
        }

        for (key, value) in &config.options {
            feed(&mut hasher, key);
            feed(&mut hasher, &value.to_string());
        }

        Ok(Self(hex::encode(hasher.finalize())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 10-character prefix naming the work directory.
    #[must_use]
    pub fn dir_prefix(&self) -> &str {
        &self.0[..10]
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn feed(hasher: &mut Sha1, value: &str) {
    hasher.update(value.as_bytes());
    hasher.update([0u8]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dop_profile::{Arch, BuildType, HostInfo, Os};
    use dop_resolver::Heuristics;
    use dop_types::{Location, OptionValue, Version};
    use std::collections::{BTreeMap, BTreeSet};

    fn profile() -> Profile {
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

    fn dag_with_revision(revision: &str) -> DepDag {
        let mut dag = DepDag::new(Heuristics::default());
        let root = dag.get_or_add_pack("pkg");
        dag.set_root(root);
        let node = dag.add_node(
            root,
            Version::new(1, 0, 0),
            Location::Cache,
            Some(revision.to_string()),
            BTreeSet::new(),
        );
        dag.set_resolved(root, node);
        dag
    }

    #[test]
    fn test_shape_and_determinism() {
        let config = BuildConfig::new(profile());
        let dag = dag_with_revision("aaaa");
        let id = BuildId::compute(&config, &dag).unwrap();
        assert_eq!(id.as_str().len(), 40);
        assert_eq!(id.dir_prefix().len(), 10);
        assert_eq!(id, BuildId::compute(&config, &dag).unwrap());
    }

    #[test]
    fn test_changes_with_inputs() {
        let config = BuildConfig::new(profile());
        let base = BuildId::compute(&config, &dag_with_revision("aaaa")).unwrap();

        // dependency revision
        let other = BuildId::compute(&config, &dag_with_revision("bbbb")).unwrap();
        assert_ne!(base, other);

        // build type
        let release = BuildConfig::new(profile().with_build_type(BuildType::Release));
        let other = BuildId::compute(&release, &dag_with_revision("aaaa")).unwrap();
        assert_ne!(base, other);

        // options
        let mut with_opts = BuildConfig::new(profile());
        with_opts
            .options
            .insert("shared".to_string(), OptionValue::Bool(true));
        let other = BuildId::compute(&with_opts, &dag_with_revision("aaaa")).unwrap();
        assert_ne!(base, other);
    }
}
