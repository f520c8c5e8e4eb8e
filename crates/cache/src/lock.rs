//! Advisory file locks guarding cache revision directories

use dop_errors::{CacheError, Error};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::warn;

/// An acquired advisory lock; released on drop
///
/// Readers take a shared lock, the single writer takes an exclusive one.
/// The lock file lives as a sibling of the guarded directory so other
/// tools can honour the same discipline.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Take a shared lock, blocking until available.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::LockFailed` when the lock file cannot be
    /// opened or locked.
    pub fn shared(path: &Path) -> Result<Self, Error> {
        let file = open_lock_file(path)?;
        file.lock_shared().map_err(|e| lock_failed(path, &e))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Take an exclusive lock, blocking until available.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::LockFailed` when the lock file cannot be
    /// opened or locked.
    pub fn exclusive(path: &Path) -> Result<Self, Error> {
        let file = open_lock_file(path)?;
        file.lock_exclusive().map_err(|e| lock_failed(path, &e))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release cache lock");
        }
    }
}

/// Open the lock file, healing a missing one.
///
/// Older caches did not ship lock files; creating one on demand keeps
/// them usable.
fn open_lock_file(path: &Path) -> Result<File, Error> {
    if !path.exists() {
        warn!(path = %path.display(), "lock file missing, creating");
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| lock_failed(path, &e).into())
}

fn lock_failed(path: &Path, err: &std::io::Error) -> CacheError {
    CacheError::LockFailed {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_locks_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".1.0.0-abc.lock");
        let a = CacheLock::shared(&path).unwrap();
        let b = CacheLock::shared(&path).unwrap();
        drop(a);
        drop(b);
    }

    #[test]
    fn test_exclusive_lock_acquire_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".1.0.0-abc.lock");
        let lock = CacheLock::exclusive(&path).unwrap();
        drop(lock);
        let again = CacheLock::exclusive(&path).unwrap();
        drop(again);
    }
}
