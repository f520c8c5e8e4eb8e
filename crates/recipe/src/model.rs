//! Raw recipe file structure
//!
//! These types mirror the YAML surface of `dopamine.yaml`. Validation and
//! classification happen in [`crate::Recipe`]; everything here is plain
//! deserialization.

use dop_profile::{Arch, BuildType, Os, Profile};
use dop_types::{Options, VersionSpec};
use semver::Version;
use serde::{Deserialize, Serialize};

/// A build, stage, or post-stage step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    /// Argv executed without a shell
    Run { run: Vec<String> },
    /// Command line passed to `sh -c`
    Shell { shell: String },
}

/// Where the package source comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    /// Relative path inside the recipe tree
    Path(String),
    /// Archive downloaded and extracted
    Fetch { fetch: FetchSource },
    /// Git checkout
    Git { git: GitSource },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSource {
    pub url: String,
    /// `sha1:<40-hex>` digest over the downloaded bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitSource {
    pub url: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

/// The `stage` field: absent (plain relocation), `false`, or custom steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageSpec {
    /// `stage: false` - never relocate, archive targets the install prefix
    Toggle(bool),
    /// Custom relocation steps
    Steps(Vec<Step>),
}

impl Default for StageSpec {
    fn default() -> Self {
        Self::Toggle(true)
    }
}

impl StageSpec {
    /// Whether relocation into a staging prefix is allowed at all.
    #[must_use]
    pub fn allows_staging(&self) -> bool {
        !matches!(self, Self::Toggle(false))
    }

    /// Custom steps, when the recipe defines them.
    #[must_use]
    pub fn steps(&self) -> Option<&[Step]> {
        match self {
            Self::Steps(steps) => Some(steps),
            Self::Toggle(_) => None,
        }
    }
}

/// Profile condition attached to a dependency
///
/// All present keys must match; an empty condition always holds. This is
/// the whole expression layer: conjunction over host os, arch, and build
/// type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct When {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<Os>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<Arch>,
    #[serde(
        default,
        rename = "build-type",
        skip_serializing_if = "Option::is_none"
    )]
    pub build_type: Option<BuildType>,
}

impl When {
    /// Evaluate the condition against a profile.
    #[must_use]
    pub fn holds(&self, profile: &Profile) -> bool {
        self.os.is_none_or(|os| os == profile.host.os)
            && self.arch.is_none_or(|arch| arch == profile.host.arch)
            && self
                .build_type
                .is_none_or(|bt| bt == profile.build_type)
    }
}

/// A dependency entry: `"name spec"` shorthand or the full form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DepEntry {
    Shorthand(String),
    Full {
        name: String,
        #[serde(default = "match_all")]
        spec: VersionSpec,
        #[serde(default, skip_serializing_if = "Options::is_empty")]
        options: Options,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<When>,
    },
}

fn match_all() -> VersionSpec {
    VersionSpec::MatchAll
}

/// Deserialization target for `dopamine.yaml`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeFile {
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default, rename = "upstream-url")]
    pub upstream_url: Option<String>,
    #[serde(default)]
    pub langs: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<DepEntry>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub build: Option<Vec<Step>>,
    #[serde(default)]
    pub stage: Option<StageSpec>,
    #[serde(default, rename = "post-stage")]
    pub post_stage: Vec<Step>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub revision: Option<String>,
}
