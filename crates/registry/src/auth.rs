//! Bearer token storage (`<DOP_HOME>/login.json`)

use dop_errors::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Map from registry host to bearer token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoginFile {
    tokens: BTreeMap<String, String>,
}

impl LoginFile {
    /// Read the login file; missing means logged in nowhere.
    ///
    /// # Errors
    ///
    /// Returns an error on unreadable or malformed content.
    pub fn load(path: &Path) -> Result<Self, Error> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::io_with_path(&e, path)),
        }
    }

    /// Persist the login file.
    ///
    /// # Errors
    ///
    /// Returns an error when the parent directory cannot be created or
    /// the write fails.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| Error::io_with_path(&e, path))?;
        Ok(())
    }

    #[must_use]
    pub fn token_for(&self, host: &str) -> Option<&str> {
        self.tokens.get(host).map(String::as_str)
    }

    pub fn set_token(&mut self, host: impl Into<String>, token: impl Into<String>) {
        self.tokens.insert(host.into(), token.into());
    }

    pub fn remove_token(&mut self, host: &str) -> bool {
        self.tokens.remove(host).is_some()
    }
}
