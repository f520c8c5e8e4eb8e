//! Unified availability across system, cache, and network
//!
//! The service aggregates three backends behind one interface. Absence at
//! a location contributes no candidates; hard failures (unreachable
//! registry, corrupt cache) surface. Fetched recipes are memoised
//! in-process, keyed by `(name, version, revision)`.

use crate::DepProvider;
use dop_cache::{CacheLock, DopHome};
use dop_errors::{DepError, Error, RegistryError};
use dop_recipe::{Recipe, RECIPE_FILE};
use dop_registry::{GetPackage, GetRecipe, RegistryClient};
use dop_types::{AvailVersion, Location, Version};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Probe command for system-provided packages
const SYSTEM_PROBE: &str = "pkg-config";

/// Availability and recipe lookup across system, cache, and network
#[derive(Debug)]
pub struct DepService {
    home: DopHome,
    registry: Option<RegistryClient>,
    system_enabled: bool,
    memo: HashMap<(String, Version, String), Recipe>,
}

impl DepService {
    /// Service over every backend. Pass `None` to work offline.
    #[must_use]
    pub fn new(home: DopHome, registry: Option<RegistryClient>) -> Self {
        Self {
            home,
            registry,
            system_enabled: true,
            memo: HashMap::new(),
        }
    }

    /// Disable the system backend up front (e.g. when the heuristics
    /// disallow system packages entirely).
    #[must_use]
    pub fn without_system(mut self) -> Self {
        self.system_enabled = false;
        self
    }

    async fn system_version(&mut self, name: &str) -> Option<Version> {
        if !self.system_enabled {
            return None;
        }
        let output = match tokio::process::Command::new(SYSTEM_PROBE)
            .arg("--modversion")
            .arg(name)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!(probe = SYSTEM_PROBE, error = %e, "system probe unavailable, disabling");
                self.system_enabled = false;
                return None;
            }
        };
        if !output.status.success() {
            // not a system package
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        match Version::parse(text.trim()) {
            Ok(version) => Some(version),
            Err(_) => {
                warn!(
                    package = name,
                    output = %text.trim(),
                    "malformed system probe output, disabling backend"
                );
                self.system_enabled = false;
                None
            }
        }
    }

    fn cache_versions(&self, name: &str) -> Result<Vec<AvailVersion>, Error> {
        let package_dir = self.home.package_dir(name);
        let mut found = Vec::new();
        let entries = match std::fs::read_dir(&package_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(Error::io_with_path(&e, &package_dir)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| Error::io_with_path(&e, &package_dir))?;
            let Ok(version) = Version::parse(&entry.file_name().to_string_lossy()) else {
                continue;
            };
            if self.cached_revision(name, &version)?.is_some() {
                found.push(AvailVersion::new(version, Location::Cache));
            }
        }
        Ok(found)
    }

    /// Most recently materialised revision of a cached version, if any.
    ///
    /// A revision directory without its recipe file is a partial entry
    /// and counts as absent.
    fn cached_revision(&self, name: &str, version: &Version) -> Result<Option<String>, Error> {
        let version_dir = self.home.version_dir(name, version);
        let entries = match std::fs::read_dir(&version_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io_with_path(&e, &version_dir)),
        };
        let mut best: Option<(std::time::SystemTime, String)> = None;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io_with_path(&e, &version_dir))?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            let _guard = CacheLock::shared(&self.home.revision_lock_path(name, version, &file_name))?;
            if !entry.path().join(RECIPE_FILE).is_file() {
                debug!(path = %entry.path().display(), "partial cache entry ignored");
                continue;
            }
            let mtime = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| Error::io_with_path(&e, entry.path()))?;
            if best.as_ref().is_none_or(|(t, _)| mtime > *t) {
                best = Some((mtime, file_name));
            }
        }
        Ok(best.map(|(_, revision)| revision))
    }

    async fn network_versions(&self, name: &str) -> Result<Vec<AvailVersion>, Error> {
        let Some(registry) = &self.registry else {
            return Ok(Vec::new());
        };
        let request = GetPackage {
            name: name.to_string(),
        };
        match registry.send(&request).await {
            Ok(package) => Ok(package
                .versions
                .into_iter()
                .map(|v| AvailVersion::new(v.version, Location::Network))
                .collect()),
            Err(Error::Registry(RegistryError::Http { code: 404, .. })) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn cache_recipe(
        &self,
        name: &str,
        version: &Version,
        revision: &str,
    ) -> Result<Recipe, Error> {
        let _guard = CacheLock::shared(&self.home.revision_lock_path(name, version, revision))?;
        let recipe_path = self
            .home
            .revision_dir(name, version, revision)
            .join(RECIPE_FILE);
        if !recipe_path.is_file() {
            return Err(DepError::NoSuchRevision {
                name: name.to_string(),
                version: version.to_string(),
                revision: revision.to_string(),
            }
            .into());
        }
        Recipe::load(&recipe_path, Some(revision.to_string()))
    }

    async fn network_recipe(
        &self,
        name: &str,
        version: &Version,
        revision: Option<&str>,
    ) -> Result<Recipe, Error> {
        let registry = self
            .registry
            .as_ref()
            .ok_or_else(|| DepError::NoSuchPackage {
                name: name.to_string(),
            })?;

        let package = registry
            .send(&GetPackage {
                name: name.to_string(),
            })
            .await?;
        let version_entry = package
            .versions
            .iter()
            .find(|v| &v.version == version)
            .ok_or_else(|| DepError::NoSuchVersion {
                name: name.to_string(),
                spec: format!("=={version}"),
            })?;
        let recipe_entry = match revision {
            Some(revision) => version_entry
                .recipes
                .iter()
                .find(|r| r.revision == revision)
                .ok_or_else(|| DepError::NoSuchRevision {
                    name: name.to_string(),
                    version: version.to_string(),
                    revision: revision.to_string(),
                })?,
            None => version_entry
                .recipes
                .first()
                .ok_or_else(|| DepError::NoSuchVersion {
                    name: name.to_string(),
                    spec: format!("=={version}"),
                })?,
        };

        let resource = registry
            .send(&GetRecipe {
                id: recipe_entry.id.clone(),
            })
            .await?;

        self.store_recipe(name, version, &resource.revision, &resource.recipe)?;
        self.cache_recipe(name, version, &resource.revision)
    }

    /// Write a fetched recipe under the exclusive per-revision lock.
    ///
    /// The file lands under a temporary name and is renamed after full
    /// receipt; a crash mid-fetch leaves no partial recipe visible.
    fn store_recipe(
        &self,
        name: &str,
        version: &Version,
        revision: &str,
        text: &str,
    ) -> Result<(), Error> {
        let _guard =
            CacheLock::exclusive(&self.home.revision_lock_path(name, version, revision))?;
        let revision_dir = self.home.revision_dir(name, version, revision);
        std::fs::create_dir_all(&revision_dir)
            .map_err(|e| Error::io_with_path(&e, &revision_dir))?;

        let tmp = tempfile::NamedTempFile::new_in(&revision_dir)
            .map_err(|e| Error::io_with_path(&e, &revision_dir))?;
        std::fs::write(tmp.path(), text).map_err(|e| Error::io_with_path(&e, tmp.path()))?;
        let recipe_path = revision_dir.join(RECIPE_FILE);
        tmp.persist(&recipe_path)
            .map_err(|e| Error::io_with_path(&e.error, &recipe_path))?;

        self.home
            .revision_flag(name, version, revision)
            .write(Some(revision))?;
        debug!(package = name, %version, revision, "recipe cached");
        Ok(())
    }

    /// The home this service reads from.
    #[must_use]
    pub fn home(&self) -> &DopHome {
        &self.home
    }
}

impl DepProvider for DepService {
    async fn available_versions(&mut self, name: &str) -> Result<Vec<AvailVersion>, Error> {
        let mut out = Vec::new();
        if let Some(version) = self.system_version(name).await {
            out.push(AvailVersion::new(version, Location::System));
        }
        out.extend(self.cache_versions(name)?);
        out.extend(self.network_versions(name).await?);
        out.sort();
        out.dedup();
        Ok(out)
    }

    async fn recipe(
        &mut self,
        name: &str,
        avail: &AvailVersion,
        revision: Option<&str>,
    ) -> Result<Recipe, Error> {
        if avail.location == Location::System {
            return Err(Error::internal(format!(
                "system package {name} has no recipe"
            )));
        }

        if let Some(revision) = revision {
            let key = (name.to_string(), avail.version.clone(), revision.to_string());
            if let Some(recipe) = self.memo.get(&key) {
                return Ok(recipe.clone());
            }
        }

        let recipe = match avail.location {
            Location::Cache => {
                let revision = match revision {
                    Some(revision) => revision.to_string(),
                    None => self.cached_revision(name, &avail.version)?.ok_or_else(|| {
                        DepError::NoSuchVersion {
                            name: name.to_string(),
                            spec: format!("=={}", avail.version),
                        }
                    })?,
                };
                self.cache_recipe(name, &avail.version, &revision)?
            }
            Location::Network => self.network_recipe(name, &avail.version, revision).await?,
            Location::System => unreachable!(),
        };

        let key = (
            name.to_string(),
            avail.version.clone(),
            recipe.revision().to_string(),
        );
        self.memo.insert(key, recipe.clone());
        Ok(recipe)
    }
}
