//! Top-level recipe state file (`.dop/state.json`)

use chrono::{DateTime, Utc};
use dop_errors::{CacheError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persistent state of a recipe checkout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeState {
    /// Directory the source stage produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_dir: Option<PathBuf>,
    /// When the last successful build finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_time: Option<DateTime<Utc>>,
}

impl RecipeState {
    /// Read the state file; a missing file yields the default state.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidState` on malformed content.
    pub fn load(path: &Path) -> Result<Self, Error> {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                CacheError::InvalidState {
                    path: path.display().to_string(),
                    message: e.to_string(),
                }
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::io_with_path(&e, path)),
        }
    }

    /// Write the state file atomically (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns an error when the parent directory cannot be created or
    /// the write fails.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let parent = path.parent().ok_or_else(|| {
            Error::internal(format!("state path has no parent: {}", path.display()))
        })?;
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
        let text = serde_json::to_string_pretty(self)?;
        let tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| Error::io_with_path(&e, parent))?;
        std::fs::write(tmp.path(), text).map_err(|e| Error::io_with_path(&e, tmp.path()))?;
        tmp.persist(path)
            .map_err(|e| Error::io_with_path(&e.error, path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = RecipeState::load(&dir.path().join("state.json")).unwrap();
        assert_eq!(state, RecipeState::default());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".dop").join("state.json");
        let state = RecipeState {
            src_dir: Some(PathBuf::from("/tmp/src")),
            build_time: Some(Utc::now()),
        };
        state.save(&path).unwrap();
        assert_eq!(RecipeState::load(&path).unwrap(), state);
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(RecipeState::load(&path).is_err());
    }
}
