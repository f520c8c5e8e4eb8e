#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Recipe model for the dopamine package manager
//!
//! A recipe is a declarative YAML file (`dopamine.yaml`) at the package
//! root. It is either a *package* recipe (buildable: defines `build` and a
//! `source`) or a *light* recipe (dependency-only: pins versions for
//! downstream consumers). The recipe file bytes are the single source of
//! truth for the revision fingerprint.

mod model;

pub use model::{
    DepEntry, FetchSource, GitSource, RecipeFile, Source, StageSpec, Step, When,
};

use dop_errors::{Error, RecipeError};
use dop_profile::Profile;
use dop_types::{validate_name, DepSpec, Lang, Options};
use semver::Version;
use sha1::{Digest, Sha1};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of a recipe at the package root
pub const RECIPE_FILE: &str = "dopamine.yaml";

/// Whether a recipe is buildable or dependency-only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeKind {
    /// Dependencies only; pins versions for downstream consumers
    Light,
    /// Buildable package
    Package,
}

/// A dependency declaration with its optional profile condition
#[derive(Debug, Clone, PartialEq)]
pub struct CondDep {
    pub dep: DepSpec,
    pub when: Option<When>,
}

/// A validated recipe
#[derive(Debug, Clone)]
pub struct Recipe {
    path: PathBuf,
    name: String,
    version: Version,
    description: Option<String>,
    license: Option<String>,
    copyright: Option<String>,
    upstream_url: Option<String>,
    langs: BTreeSet<Lang>,
    dependencies: Vec<CondDep>,
    source: Option<Source>,
    build: Option<Vec<Step>>,
    stage: StageSpec,
    post_stage: Vec<Step>,
    include: Vec<String>,
    kind: RecipeKind,
    revision: String,
}

impl Recipe {
    /// Load and validate the recipe file at `path`.
    ///
    /// The revision is, in order: `revision_override` when given, the
    /// `revision` field of the file, else the SHA-1 over the file bytes.
    ///
    /// # Errors
    ///
    /// Returns `RecipeError` on missing file, parse failure, or
    /// structural violation.
    pub fn load(path: &Path, revision_override: Option<String>) -> Result<Self, Error> {
        let display = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|_| RecipeError::NotFound {
            path: display.clone(),
        })?;
        let file: RecipeFile =
            serde_yml::from_slice(&bytes).map_err(|e| RecipeError::Parse {
                path: display.clone(),
                message: e.to_string(),
            })?;

        let revision = revision_override
            .or_else(|| file.revision.clone())
            .unwrap_or_else(|| hex::encode(Sha1::digest(&bytes)));

        let recipe = Self::from_file(path, file, revision)?;
        debug!(
            recipe = %recipe.name,
            version = %recipe.version,
            revision = %recipe.revision,
            kind = ?recipe.kind,
            "loaded recipe"
        );
        Ok(recipe)
    }

    /// Load `dopamine.yaml` from a package root directory.
    ///
    /// # Errors
    ///
    /// See [`Recipe::load`].
    pub fn load_from_dir(dir: &Path) -> Result<Self, Error> {
        Self::load(&dir.join(RECIPE_FILE), None)
    }

    fn from_file(path: &Path, file: RecipeFile, revision: String) -> Result<Self, Error> {
        let display = path.display().to_string();

        validate_name(&file.name).map_err(|e| RecipeError::InvalidField {
            path: display.clone(),
            field: "name".to_string(),
            message: e.to_string(),
        })?;

        let mut langs = BTreeSet::new();
        for lang in &file.langs {
            let parsed: Lang = lang.parse().map_err(|_| RecipeError::InvalidField {
                path: display.clone(),
                field: "langs".to_string(),
                message: format!("unknown language: {lang}"),
            })?;
            langs.insert(parsed);
        }

        let dependencies = file
            .dependencies
            .iter()
            .map(|entry| cond_dep(entry, &display))
            .collect::<Result<Vec<_>, Error>>()?;

        let kind = if file.build.is_some() {
            RecipeKind::Package
        } else {
            RecipeKind::Light
        };

        match kind {
            RecipeKind::Package => {
                if file.source.is_none() {
                    return Err(RecipeError::MissingSource { path: display }.into());
                }
            }
            RecipeKind::Light => {
                if dependencies.is_empty() {
                    return Err(RecipeError::LightWithoutDependencies { path: display }.into());
                }
                for (field, defined) in [
                    ("source", file.source.is_some()),
                    ("stage", file.stage.is_some()),
                    ("post-stage", !file.post_stage.is_empty()),
                ] {
                    if defined {
                        return Err(RecipeError::LightWithBuildField {
                            path: display.clone(),
                            field: field.to_string(),
                        }
                        .into());
                    }
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            name: file.name,
            version: file.version,
            description: file.description,
            license: file.license,
            copyright: file.copyright,
            upstream_url: file.upstream_url,
            langs,
            dependencies,
            source: file.source,
            build: file.build,
            stage: file.stage.unwrap_or_default(),
            post_stage: file.post_stage,
            include: file.include,
            kind,
            revision,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the recipe file.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }

    #[must_use]
    pub fn copyright(&self) -> Option<&str> {
        self.copyright.as_deref()
    }

    #[must_use]
    pub fn upstream_url(&self) -> Option<&str> {
        self.upstream_url.as_deref()
    }

    #[must_use]
    pub fn langs(&self) -> &BTreeSet<Lang> {
        &self.langs
    }

    #[must_use]
    pub fn kind(&self) -> RecipeKind {
        self.kind
    }

    #[must_use]
    pub fn is_light(&self) -> bool {
        self.kind == RecipeKind::Light
    }

    #[must_use]
    pub fn is_package(&self) -> bool {
        self.kind == RecipeKind::Package
    }

    /// Content fingerprint of the recipe.
    #[must_use]
    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Dependencies whose `when` condition holds for `profile`.
    #[must_use]
    pub fn dependencies(&self, profile: &Profile) -> Vec<DepSpec> {
        self.dependencies
            .iter()
            .filter(|cond| cond.when.as_ref().is_none_or(|w| w.holds(profile)))
            .map(|cond| cond.dep.clone())
            .collect()
    }

    /// Every declared dependency, conditions included.
    #[must_use]
    pub fn all_dependencies(&self) -> &[CondDep] {
        &self.dependencies
    }

    #[must_use]
    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// Constant in-tree source path, when the recipe uses one.
    #[must_use]
    pub fn in_tree_source(&self) -> Option<&str> {
        match &self.source {
            Some(Source::Path(path)) => Some(path),
            _ => None,
        }
    }

    #[must_use]
    pub fn build_steps(&self) -> Option<&[Step]> {
        self.build.as_deref()
    }

    #[must_use]
    pub fn stage(&self) -> &StageSpec {
        &self.stage
    }

    #[must_use]
    pub fn post_stage(&self) -> &[Step] {
        &self.post_stage
    }

    /// Glob patterns selecting the files published with the recipe.
    #[must_use]
    pub fn include(&self) -> &[String] {
        &self.include
    }
}

fn cond_dep(entry: &DepEntry, path: &str) -> Result<CondDep, Error> {
    match entry {
        DepEntry::Shorthand(text) => {
            let dep: DepSpec = text.parse().map_err(|e| RecipeError::InvalidField {
                path: path.to_string(),
                field: "dependencies".to_string(),
                message: format!("{e}"),
            })?;
            Ok(CondDep { dep, when: None })
        }
        DepEntry::Full {
            name,
            spec,
            options,
            when,
        } => {
            validate_name(name).map_err(|e| RecipeError::InvalidField {
                path: path.to_string(),
                field: "dependencies".to_string(),
                message: e.to_string(),
            })?;
            let mut dep = DepSpec::new(name.clone(), spec.clone());
            dep.options = options.clone();
            Ok(CondDep {
                dep,
                when: when.clone(),
            })
        }
    }
}

/// Compute the revision fingerprint of recipe file bytes.
#[must_use]
pub fn revision_of(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Options helper re-exported for hook plumbing
pub type RecipeOptions = Options;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_recipe(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join(RECIPE_FILE);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        path
    }

    const PACKAGE_RECIPE: &str = r#"
name: zlib
version: 1.3.1
description: compression library
license: Zlib
langs: [c]
dependencies:
  - pkg-a >=1.0.0
source: .
build:
  - run: [make, all]
  - shell: "make install PREFIX=$DOP_INSTALL_DIR"
"#;

    const LIGHT_RECIPE: &str = r"
name: my-deps
version: 0.1.0
dependencies:
  - zlib ~>1.3
  - name: curl
    spec: '>=8.0.0'
";

    #[test]
    fn test_load_package_recipe() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recipe(dir.path(), PACKAGE_RECIPE);
        let recipe = Recipe::load(&path, None).unwrap();
        assert!(recipe.is_package());
        assert_eq!(recipe.name(), "zlib");
        assert_eq!(recipe.version(), &Version::new(1, 3, 1));
        assert_eq!(recipe.in_tree_source(), Some("."));
        assert_eq!(recipe.build_steps().unwrap().len(), 2);
        assert_eq!(recipe.langs().len(), 1);
    }

    #[test]
    fn test_load_light_recipe() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recipe(dir.path(), LIGHT_RECIPE);
        let recipe = Recipe::load(&path, None).unwrap();
        assert!(recipe.is_light());
        assert_eq!(recipe.all_dependencies().len(), 2);
    }

    #[test]
    fn test_revision_is_content_sha1() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recipe(dir.path(), PACKAGE_RECIPE);
        let recipe = Recipe::load(&path, None).unwrap();
        assert_eq!(recipe.revision(), revision_of(PACKAGE_RECIPE.as_bytes()));
        assert_eq!(recipe.revision().len(), 40);

        let pinned = Recipe::load(&path, Some("deadbeef".to_string())).unwrap();
        assert_eq!(pinned.revision(), "deadbeef");
    }

    #[test]
    fn test_package_without_source_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recipe(
            dir.path(),
            "name: broken\nversion: 1.0.0\nbuild:\n  - run: [make]\n",
        );
        assert!(Recipe::load(&path, None).is_err());
    }

    #[test]
    fn test_light_without_dependencies_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recipe(dir.path(), "name: empty\nversion: 1.0.0\n");
        assert!(Recipe::load(&path, None).is_err());
    }

    #[test]
    fn test_light_with_source_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recipe(
            dir.path(),
            "name: bad\nversion: 1.0.0\ndependencies: [zlib]\nsource: .\n",
        );
        assert!(Recipe::load(&path, None).is_err());
    }

    #[test]
    fn test_stage_false() {
        let dir = tempfile::tempdir().unwrap();
        let text = format!("{PACKAGE_RECIPE}stage: false\n");
        let path = write_recipe(dir.path(), &text);
        let recipe = Recipe::load(&path, None).unwrap();
        assert!(!recipe.stage().allows_staging());
    }

    #[test]
    fn test_conditional_dependencies() {
        use dop_profile::{Arch, BuildType, HostInfo, Os, Profile};
        let dir = tempfile::tempdir().unwrap();
        let text = r"
name: cond
version: 1.0.0
dependencies:
  - name: everywhere
  - name: linux-only
    when:
      os: linux
  - name: windows-only
    when:
      os: windows
";
        let path = write_recipe(dir.path(), text);
        let recipe = Recipe::load(&path, None).unwrap();

        let profile = Profile::new(
            "default",
            HostInfo {
                os: Os::Linux,
                arch: Arch::X86_64,
            },
            BuildType::Debug,
            std::collections::BTreeMap::new(),
        );
        let deps = recipe.dependencies(&profile);
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["everywhere", "linux-only"]);
    }
}
