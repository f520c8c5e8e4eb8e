//! Flag files: on-disk markers whose mtime is the semantic signal

use dop_errors::{CacheError, Error};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A small on-disk marker with an mtime and an optional text payload
///
/// A prerequisite `P` is satisfied for successor `S` iff `S` exists and
/// `S.mtime` is strictly greater than both `P.mtime` and the recipe file
/// mtime.
#[derive(Debug, Clone)]
pub struct FlagFile {
    path: PathBuf,
}

impl FlagFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Modification time, `None` when the flag has not been written.
    ///
    /// # Errors
    ///
    /// Returns an error when the metadata of an existing file cannot be
    /// read.
    pub fn mtime(&self) -> Result<Option<SystemTime>, Error> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(meta.modified()?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io_with_path(&e, &self.path)),
        }
    }

    /// Text payload, `None` when the flag has not been written.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing file cannot be read or is not
    /// UTF-8.
    pub fn read(&self) -> Result<Option<String>, Error> {
        match std::fs::read(&self.path) {
            Ok(bytes) => {
                let text = String::from_utf8(bytes).map_err(|_| CacheError::InvalidFlag {
                    path: self.path.display().to_string(),
                    message: "payload is not UTF-8".to_string(),
                })?;
                Ok(Some(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io_with_path(&e, &self.path)),
        }
    }

    /// Write the flag, stamping the current time.
    ///
    /// # Errors
    ///
    /// Returns an error when the parent directory cannot be created or
    /// the write fails.
    pub fn write(&self, payload: Option<&str>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
        }
        std::fs::write(&self.path, payload.unwrap_or_default())
            .map_err(|e| Error::io_with_path(&e, &self.path))?;
        Ok(())
    }

    /// Write the flag with no payload.
    ///
    /// # Errors
    ///
    /// See [`FlagFile::write`].
    pub fn touch(&self) -> Result<(), Error> {
        self.write(None)
    }

    /// Remove the flag; missing is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error on any failure other than the file being absent.
    pub fn remove(&self) -> Result<(), Error> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io_with_path(&e, &self.path)),
        }
    }

    /// Apply the staleness rule against prerequisite mtimes.
    ///
    /// The caller includes the recipe file mtime among `prerequisites`.
    ///
    /// # Errors
    ///
    /// Returns an error when this flag's metadata cannot be read.
    pub fn is_up_to_date(
        &self,
        prerequisites: impl IntoIterator<Item = SystemTime>,
    ) -> Result<bool, Error> {
        let Some(own) = self.mtime()? else {
            return Ok(false);
        };
        Ok(prerequisites.into_iter().all(|prereq| own > prereq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_write_read_payload() {
        let dir = tempfile::tempdir().unwrap();
        let flag = FlagFile::new(dir.path().join(".source"));
        assert!(!flag.exists());
        assert_eq!(flag.read().unwrap(), None);

        flag.write(Some("/tmp/src")).unwrap();
        assert!(flag.exists());
        assert_eq!(flag.read().unwrap().as_deref(), Some("/tmp/src"));

        flag.remove().unwrap();
        assert!(!flag.exists());
        flag.remove().unwrap();
    }

    #[test]
    fn test_up_to_date_rule() {
        let dir = tempfile::tempdir().unwrap();
        let prereq = FlagFile::new(dir.path().join(".config-ok"));
        let flag = FlagFile::new(dir.path().join(".build-ok"));

        prereq.touch().unwrap();
        sleep(Duration::from_millis(20));
        flag.touch().unwrap();

        let prereq_mtime = prereq.mtime().unwrap().unwrap();
        assert!(flag.is_up_to_date([prereq_mtime]).unwrap());

        // prerequisite renewed after the flag: stale
        sleep(Duration::from_millis(20));
        prereq.touch().unwrap();
        let prereq_mtime = prereq.mtime().unwrap().unwrap();
        assert!(!flag.is_up_to_date([prereq_mtime]).unwrap());

        // missing flag is never up to date
        let missing = FlagFile::new(dir.path().join(".absent"));
        assert!(!missing.is_up_to_date([prereq_mtime]).unwrap());
    }
}
