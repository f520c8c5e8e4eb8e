//! Publishing a recipe to the registry
//!
//! Posts the recipe metadata, then uploads a tar.xz of the recipe tree
//! using the single-use bearer token from the response.

use crate::archive::create_archive;
use dop_errors::{BuildError, Error};
use dop_recipe::{Recipe, RECIPE_FILE};
use dop_registry::{NewKind, NewRecipeBody, PostRecipe, RegistryClient};
use std::path::{Path, PathBuf};
use tracing::info;

/// What a publish run did
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub new: NewKind,
    pub recipe_id: String,
    pub archive_name: String,
}

/// Publish `recipe` to the registry behind `client`.
///
/// # Errors
///
/// Registry errors (auth, upload token), archive failures, and I/O
/// errors all surface.
pub async fn publish(recipe: &Recipe, client: &RegistryClient) -> Result<PublishReport, Error> {
    let body = NewRecipeBody {
        name: recipe.name().to_string(),
        version: recipe.version().clone(),
        revision: recipe.revision().to_string(),
        description: recipe.description().map(str::to_string),
        upstream_url: recipe.upstream_url().map(str::to_string),
        license: recipe.license().map(str::to_string),
    };
    let response = client.send(&PostRecipe(body)).await?;
    info!(
        package = recipe.name(),
        version = %recipe.version(),
        new = ?response.new,
        "recipe registered"
    );

    let staging = tempfile::tempdir().map_err(|e| Error::io_with_path(&e, "tempdir"))?;
    let tree = staging.path().join("tree");
    copy_recipe_tree(recipe, &tree)?;

    let archive = staging.path().join(&response.recipe.archive_name);
    create_archive(&tree, &archive).await?;
    client
        .upload_archive(&response.upload_bearer_token, &response.recipe.archive_name, &archive)
        .await?;

    Ok(PublishReport {
        new: response.new,
        recipe_id: response.recipe.id,
        archive_name: response.recipe.archive_name,
    })
}

/// Copy the files selected by the recipe's `include` globs (all
/// non-hidden files when none are given) into `dest`, preserving
/// package-relative paths. The recipe file itself is always included.
///
/// # Errors
///
/// Bad glob patterns, patterns escaping the recipe root, and I/O
/// failures.
pub fn copy_recipe_tree(recipe: &Recipe, dest: &Path) -> Result<(), Error> {
    let root = recipe.root_dir();
    let mut selected: Vec<PathBuf> = Vec::new();

    if recipe.include().is_empty() {
        collect_default(root, Path::new(""), &mut selected)?;
    } else {
        for pattern in recipe.include() {
            let full = root.join(pattern).display().to_string();
            let paths = glob::glob(&full).map_err(|e| BuildError::Archive {
                message: format!("bad include pattern {pattern}: {e}"),
            })?;
            for path in paths {
                let path = path.map_err(|e| BuildError::Archive {
                    message: e.to_string(),
                })?;
                if path.is_file() {
                    let rel = path.strip_prefix(root).map_err(|_| BuildError::Archive {
                        message: format!("include escapes recipe root: {}", path.display()),
                    })?;
                    selected.push(rel.to_path_buf());
                }
            }
        }
    }

    let recipe_rel = PathBuf::from(RECIPE_FILE);
    if !selected.contains(&recipe_rel) {
        selected.push(recipe_rel);
    }
    selected.sort();
    selected.dedup();

    for rel in selected {
        let from = root.join(&rel);
        let to = dest.join(&rel);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
        }
        std::fs::copy(&from, &to).map_err(|e| Error::io_with_path(&e, &from))?;
    }
    Ok(())
}

/// Default selection: every file except hidden entries, the work area,
/// and the lock file.
fn collect_default(root: &Path, rel: &Path, out: &mut Vec<PathBuf>) -> Result<(), Error> {
    let dir = root.join(rel);
    for entry in std::fs::read_dir(&dir).map_err(|e| Error::io_with_path(&e, &dir))? {
        let entry = entry.map_err(|e| Error::io_with_path(&e, &dir))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == "dop.lock" {
            continue;
        }
        let child = rel.join(&name);
        let file_type = entry
            .file_type()
            .map_err(|e| Error::io_with_path(&e, entry.path()))?;
        if file_type.is_dir() {
            collect_default(root, &child, out)?;
        } else if file_type.is_file() {
            out.push(child);
        }
    }
    Ok(())
}
