//! Build tool description and discovery

use dop_errors::{BuildError, Error};
use dop_types::{Lang, Version};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Extra identification carried by the MSVC toolchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsvcInfo {
    pub line_version: String,
    pub display: String,
}

/// A compiler or build tool referenced by a profile
///
/// Tools are keyed by a stable id (`dc`, `cc`, `cxx`, `msvc`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msvc: Option<MsvcInfo>,
}

impl Tool {
    /// Candidate binary names probed for a language, in preference order.
    #[must_use]
    pub fn candidates(lang: Lang) -> &'static [&'static str] {
        match lang {
            Lang::D => &["dmd", "ldc2", "gdc"],
            Lang::C => &["cc", "gcc", "clang"],
            Lang::Cxx => &["c++", "g++", "clang++"],
        }
    }

    /// Locate and probe the tool for `lang` on the current host.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::ToolProbe` when no candidate binary is found
    /// on `PATH` or the found binary cannot report a version.
    pub fn detect(lang: Lang) -> Result<Self, Error> {
        for name in Self::candidates(lang) {
            let Ok(path) = which::which(name) else {
                continue;
            };
            debug!(tool = name, path = %path.display(), "probing");
            let version = probe_version(&path)?;
            return Ok(Self {
                id: lang.tool_id().to_string(),
                name: (*name).to_string(),
                version,
                path,
                msvc: None,
            });
        }
        Err(BuildError::ToolProbe {
            tool: lang.tool_id().to_string(),
            message: format!("no {lang} compiler found on PATH"),
        }
        .into())
    }
}

/// Run `tool --version` and pull the first semver-looking token out of
/// the first line. Tools with unparseable output keep `None`.
fn probe_version(path: &std::path::Path) -> Result<Option<Version>, Error> {
    let output = Command::new(path)
        .arg("--version")
        .output()
        .map_err(|e| BuildError::ToolProbe {
            tool: path.display().to_string(),
            message: e.to_string(),
        })?;
    let text = String::from_utf8_lossy(&output.stdout);
    let first_line = text.lines().next().unwrap_or_default();
    Ok(extract_version(first_line))
}

fn extract_version(line: &str) -> Option<Version> {
    line.split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .filter_map(|token| {
            let token = token.trim_start_matches('v');
            Version::parse(token).ok()
        })
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_version() {
        assert_eq!(
            extract_version("DMD64 D Compiler v2.109.1"),
            Some(Version::new(2, 109, 1))
        );
        assert_eq!(
            extract_version("gcc (GCC) 13.2.0"),
            Some(Version::new(13, 2, 0))
        );
        assert_eq!(extract_version("no digits here"), None);
    }
}
