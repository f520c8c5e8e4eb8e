//! Archive creation and extraction (tar within xz)
//!
//! Entry names are package-relative paths; header mode is deterministic
//! so identical trees produce identical archives. Extraction rejects
//! entries escaping the destination.

use dop_errors::{BuildError, Error};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, HeaderMode};
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

const XZ_LEVEL: u32 = 6;

/// Create `dest` from the contents of `src_dir`.
///
/// # Errors
///
/// Returns `BuildError::Archive` on any codec or I/O failure.
pub async fn create_archive(src_dir: &Path, dest: &Path) -> Result<(), Error> {
    let src_dir = src_dir.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || create_archive_sync(&src_dir, &dest))
        .await
        .map_err(|e| Error::internal(format!("archive task failed: {e}")))?
}

fn create_archive_sync(src_dir: &Path, dest: &Path) -> Result<(), Error> {
    use std::fs::File;
    use std::io::BufWriter;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
    }
    let file = File::create(dest).map_err(|e| Error::io_with_path(&e, dest))?;
    let encoder = XzEncoder::new(BufWriter::new(file), XZ_LEVEL);
    let mut builder = Builder::new(encoder);
    builder.mode(HeaderMode::Deterministic);
    builder.follow_symlinks(false);

    // sorted walk keeps entry order independent of readdir order
    let mut entries = Vec::new();
    collect_entries(src_dir, Path::new(""), &mut entries)?;
    entries.sort();

    for rel in entries {
        let path = src_dir.join(&rel);
        builder
            .append_path_with_name(&path, &rel)
            .map_err(|e| archive_error(&path, &e))?;
    }

    builder
        .into_inner()
        .and_then(XzEncoder::finish)
        .map_err(|e| archive_error(dest, &e))?;
    Ok(())
}

fn collect_entries(root: &Path, rel: &Path, out: &mut Vec<PathBuf>) -> Result<(), Error> {
    let dir = root.join(rel);
    let entries = std::fs::read_dir(&dir).map_err(|e| Error::io_with_path(&e, &dir))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io_with_path(&e, &dir))?;
        let child = rel.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| Error::io_with_path(&e, entry.path()))?;
        if file_type.is_dir() {
            collect_entries(root, &child, out)?;
        } else {
            out.push(child);
        }
    }
    Ok(())
}

/// Extract `archive` into `dest`.
///
/// # Errors
///
/// Returns `BuildError::Archive` on codec failures or entries with
/// absolute or parent-escaping paths.
pub async fn extract_archive(archive: &Path, dest: &Path) -> Result<(), Error> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || extract_archive_sync(&archive, &dest))
        .await
        .map_err(|e| Error::internal(format!("extract task failed: {e}")))?
}

fn extract_archive_sync(archive_path: &Path, dest: &Path) -> Result<(), Error> {
    use std::fs::File;
    use std::io::BufReader;

    std::fs::create_dir_all(dest).map_err(|e| Error::io_with_path(&e, dest))?;
    let file = File::open(archive_path).map_err(|e| Error::io_with_path(&e, archive_path))?;
    let mut archive = Archive::new(XzDecoder::new(BufReader::new(file)));
    archive.set_preserve_permissions(true);

    for entry in archive.entries().map_err(|e| archive_error(archive_path, &e))? {
        let mut entry = entry.map_err(|e| archive_error(archive_path, &e))?;
        let path = entry
            .path()
            .map_err(|e| archive_error(archive_path, &e))?
            .into_owned();
        if path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(BuildError::Archive {
                message: format!("refusing entry path {}", path.display()),
            }
            .into());
        }
        entry
            .unpack(dest.join(&path))
            .map_err(|e| archive_error(&path, &e))?;
    }
    Ok(())
}

fn archive_error(path: &Path, err: &std::io::Error) -> Error {
    BuildError::Archive {
        message: format!("{}: {err}", path.display()),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[tokio::test]
    async fn test_round_trip_preserves_content_and_modes() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("bin")).unwrap();
        std::fs::create_dir_all(src.path().join("lib")).unwrap();
        std::fs::write(src.path().join("bin/tool"), b"#!/bin/sh\necho hi\n").unwrap();
        std::fs::write(src.path().join("lib/libx.a"), b"\x00\x01binary").unwrap();
        std::fs::set_permissions(
            src.path().join("bin/tool"),
            std::fs::Permissions::from_mode(0o755),
        )
        .unwrap();

        let staged = tempfile::tempdir().unwrap();
        let archive = staged.path().join("pkg.tar.xz");
        create_archive(src.path(), &archive).await.unwrap();

        let out = tempfile::tempdir().unwrap();
        extract_archive(&archive, out.path()).await.unwrap();

        let tool = std::fs::read(out.path().join("bin/tool")).unwrap();
        assert_eq!(tool, b"#!/bin/sh\necho hi\n");
        let libx = std::fs::read(out.path().join("lib/libx.a")).unwrap();
        assert_eq!(libx, b"\x00\x01binary");

        let mode = std::fs::metadata(out.path().join("bin/tool"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);

        // no extra entries
        let count = walk_count(out.path());
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_identical_trees_identical_archives() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("f.txt"), b"same").unwrap();

        let out = tempfile::tempdir().unwrap();
        let a = out.path().join("a.tar.xz");
        let b = out.path().join("b.tar.xz");
        create_archive(src.path(), &a).await.unwrap();
        create_archive(src.path(), &b).await.unwrap();
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }

    fn walk_count(dir: &Path) -> usize {
        let mut count = 0;
        for entry in std::fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                count += walk_count(&entry.path());
            } else {
                count += 1;
            }
        }
        count
    }
}
