//! Deterministic on-disk layout rooted at `DOP_HOME`

use crate::flag::FlagFile;
use dop_errors::Error;
use dop_types::Version;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache root
pub const DOP_HOME_ENV: &str = "DOP_HOME";

/// Environment variable naming the default registry host
pub const DOP_REGISTRY_ENV: &str = "DOP_REGISTRY";

/// The dopamine home directory and the paths derived from it
///
/// ```text
/// <root>/
///   cache/packages/<name>/<version>/<revision>/   recipe tree
///   cache/packages/<name>/<version>/.<revision>   revision flag
///   login.json                                    host -> bearer token
/// ```
#[derive(Debug, Clone)]
pub struct DopHome {
    root: PathBuf,
}

impl DopHome {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve from `DOP_HOME`, falling back to `~/.dopamine`.
    ///
    /// # Errors
    ///
    /// Returns an error when neither the variable nor a home directory
    /// is available.
    pub fn from_env() -> Result<Self, Error> {
        if let Ok(home) = std::env::var(DOP_HOME_ENV) {
            return Ok(Self::new(home));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::internal("cannot determine home directory; set DOP_HOME"))?;
        Ok(Self::new(home.join(".dopamine")))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    #[must_use]
    pub fn packages_dir(&self) -> PathBuf {
        self.cache_dir().join("packages")
    }

    #[must_use]
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.packages_dir().join(name)
    }

    #[must_use]
    pub fn version_dir(&self, name: &str, version: &Version) -> PathBuf {
        self.package_dir(name).join(version.to_string())
    }

    /// Content-addressed recipe directory.
    #[must_use]
    pub fn revision_dir(&self, name: &str, version: &Version, revision: &str) -> PathBuf {
        self.version_dir(name, version).join(revision)
    }

    /// Flag marking a fully materialised revision directory.
    #[must_use]
    pub fn revision_flag(&self, name: &str, version: &Version, revision: &str) -> FlagFile {
        FlagFile::new(self.version_dir(name, version).join(format!(".{revision}")))
    }

    /// Sibling advisory lock file of a revision directory.
    #[must_use]
    pub fn revision_lock_path(&self, name: &str, version: &Version, revision: &str) -> PathBuf {
        self.version_dir(name, version)
            .join(format!(".{revision}.lock"))
    }

    /// The `host -> bearer token` login file.
    #[must_use]
    pub fn login_file(&self) -> PathBuf {
        self.root.join("login.json")
    }
}

/// Per-recipe work area (`<recipe>/.dop`), one config dir per build id
///
/// ```text
/// <recipe>/.dop/
///   .source                 flag, payload = fetched source dir
///   state.json              top-level state
///   <build-id[..10]>/
///     build/                build sandbox
///     install/              staged install prefix
///     .config-ok .build-ok .install-ok
/// ```
#[derive(Debug, Clone)]
pub struct WorkDirs {
    dop_dir: PathBuf,
    config_prefix: String,
}

impl WorkDirs {
    /// `config_prefix` is the 10-character build-id prefix.
    #[must_use]
    pub fn new(recipe_root: &Path, config_prefix: impl Into<String>) -> Self {
        Self {
            dop_dir: recipe_root.join(".dop"),
            config_prefix: config_prefix.into(),
        }
    }

    #[must_use]
    pub fn dop_dir(&self) -> &Path {
        &self.dop_dir
    }

    #[must_use]
    pub fn source_flag(&self) -> FlagFile {
        FlagFile::new(self.dop_dir.join(".source"))
    }

    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.dop_dir.join("state.json")
    }

    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.dop_dir.join(&self.config_prefix)
    }

    #[must_use]
    pub fn build_dir(&self) -> PathBuf {
        self.config_dir().join("build")
    }

    #[must_use]
    pub fn install_dir(&self) -> PathBuf {
        self.config_dir().join("install")
    }

    #[must_use]
    pub fn config_flag(&self) -> FlagFile {
        FlagFile::new(self.config_dir().join(".config-ok"))
    }

    #[must_use]
    pub fn build_flag(&self) -> FlagFile {
        FlagFile::new(self.config_dir().join(".build-ok"))
    }

    #[must_use]
    pub fn install_flag(&self) -> FlagFile {
        FlagFile::new(self.config_dir().join(".install-ok"))
    }

    /// Path of the archive produced for this config.
    #[must_use]
    pub fn archive_path(&self, name: &str, version: &Version) -> PathBuf {
        self.config_dir()
            .join(format!("{name}-{version}.tar.xz"))
    }
}
