//! Source acquisition
//!
//! Resolves a recipe's `source` to a directory on disk: an in-tree
//! relative path, a downloaded-and-extracted archive, or a git checkout.

use crate::archive::extract_archive;
use dop_cache::WorkDirs;
use dop_errors::{BuildError, Error};
use dop_recipe::{FetchSource, GitSource, Recipe, Source};
use futures::StreamExt;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Materialise the source of a package recipe, returning its directory.
///
/// # Errors
///
/// `BuildError::SourceFetch` on download/clone failures,
/// `ChecksumMismatch` when a fetched archive fails verification.
pub async fn fetch_source(
    recipe: &Recipe,
    work: &WorkDirs,
    cancel: &CancellationToken,
) -> Result<PathBuf, Error> {
    let source = recipe.source().ok_or_else(|| BuildError::SourceFetch {
        message: "recipe has no source".to_string(),
    })?;

    match source {
        Source::Path(rel) => {
            let dir = recipe.root_dir().join(rel);
            if !dir.is_dir() {
                return Err(BuildError::SourceFetch {
                    message: format!("in-tree source {} is not a directory", dir.display()),
                }
                .into());
            }
            Ok(dir)
        }
        Source::Fetch { fetch } => fetch_remote(fetch, work, cancel).await,
        Source::Git { git } => clone_git(git, work, cancel).await,
    }
}

async fn fetch_remote(
    fetch: &FetchSource,
    work: &WorkDirs,
    cancel: &CancellationToken,
) -> Result<PathBuf, Error> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let file_name = fetch
        .url
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| BuildError::SourceFetch {
            message: format!("cannot derive file name from {}", fetch.url),
        })?;
    let download_dir = work.dop_dir().join("downloads");
    std::fs::create_dir_all(&download_dir).map_err(|e| Error::io_with_path(&e, &download_dir))?;
    let download_path = download_dir.join(file_name);

    info!(url = %fetch.url, "downloading source");
    download(&fetch.url, &download_path).await?;

    if let Some(checksum) = &fetch.checksum {
        verify_checksum(&fetch.url, &download_path, checksum)?;
    }

    let extract_dir = work.dop_dir().join("src");
    if extract_dir.exists() {
        std::fs::remove_dir_all(&extract_dir).map_err(|e| Error::io_with_path(&e, &extract_dir))?;
    }
    extract_archive(&download_path, &extract_dir).await?;

    Ok(single_subdir_or_self(&extract_dir)?)
}

async fn download(url: &str, dest: &Path) -> Result<(), Error> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| BuildError::SourceFetch {
            message: e.to_string(),
        })?;
    if !response.status().is_success() {
        return Err(BuildError::SourceFetch {
            message: format!("{url}: HTTP {}", response.status()),
        }
        .into());
    }
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| Error::io_with_path(&e, dest))?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| BuildError::SourceFetch {
            message: e.to_string(),
        })?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
            .await
            .map_err(|e| Error::io_with_path(&e, dest))?;
    }
    Ok(())
}

/// `checksum` is `sha1:<40-hex>` over the downloaded bytes.
fn verify_checksum(url: &str, path: &Path, checksum: &str) -> Result<(), Error> {
    let expected = checksum
        .strip_prefix("sha1:")
        .ok_or_else(|| BuildError::SourceFetch {
            message: format!("unsupported checksum format: {checksum}"),
        })?;
    let bytes = std::fs::read(path).map_err(|e| Error::io_with_path(&e, path))?;
    let actual = hex::encode(Sha1::digest(&bytes));
    if actual == expected.to_ascii_lowercase() {
        debug!(path = %path.display(), "checksum verified");
        Ok(())
    } else {
        Err(BuildError::ChecksumMismatch {
            url: url.to_string(),
            expected: expected.to_string(),
            actual,
        }
        .into())
    }
}

async fn clone_git(
    git: &GitSource,
    work: &WorkDirs,
    cancel: &CancellationToken,
) -> Result<PathBuf, Error> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let dest = work.dop_dir().join("src-git");
    if dest.exists() {
        std::fs::remove_dir_all(&dest).map_err(|e| Error::io_with_path(&e, &dest))?;
    }
    info!(url = %git.url, git_ref = %git.git_ref, "cloning source");

    let status = tokio::process::Command::new("git")
        .arg("clone")
        .arg("--depth")
        .arg("1")
        .arg("--branch")
        .arg(&git.git_ref)
        .arg(&git.url)
        .arg(&dest)
        .status()
        .await
        .map_err(|e| BuildError::SourceFetch {
            message: format!("git: {e}"),
        })?;
    if !status.success() {
        return Err(BuildError::SourceFetch {
            message: format!("git clone of {} failed", git.url),
        }
        .into());
    }
    Ok(dest)
}

/// An archive extracting to exactly one directory means that directory
/// is the source root.
fn single_subdir_or_self(dir: &Path) -> Result<PathBuf, Error> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| Error::io_with_path(&e, dir))? {
        let entry = entry.map_err(|e| Error::io_with_path(&e, dir))?;
        entries.push(entry);
    }
    if entries.len() == 1 && entries[0].path().is_dir() {
        Ok(entries[0].path())
    } else {
        Ok(dir.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact");
        std::fs::write(&path, b"payload").unwrap();
        let digest = hex::encode(Sha1::digest(b"payload"));

        verify_checksum("http://x/artifact", &path, &format!("sha1:{digest}")).unwrap();

        let err = verify_checksum("http://x/artifact", &path, "sha1:0000").unwrap_err();
        assert!(matches!(
            err,
            Error::Build(BuildError::ChecksumMismatch { .. })
        ));

        let err = verify_checksum("http://x/artifact", &path, "md5:abc").unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::SourceFetch { .. })));
    }

    #[test]
    fn test_single_subdir_detection() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("pkg-1.0.0")).unwrap();
        assert_eq!(
            single_subdir_or_self(dir.path()).unwrap(),
            dir.path().join("pkg-1.0.0")
        );

        std::fs::write(dir.path().join("extra.txt"), "x").unwrap();
        assert_eq!(single_subdir_or_self(dir.path()).unwrap(), dir.path());
    }
}
