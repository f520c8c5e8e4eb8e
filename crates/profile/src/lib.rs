#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Build profiles for the dopamine package manager
//!
//! A profile describes the host, the build type, and the tools a build
//! runs with. Its SHA-1 digest is the cache key every artifact hangs off:
//! two profiles with equal digests are interchangeable, and any observable
//! change to host, build type, or tools changes the digest.

mod host;
mod tool;

pub use host::{Arch, HostInfo, Os};
pub use tool::{MsvcInfo, Tool};

use dop_errors::{BuildError, Error, ParseError};
use dop_types::Lang;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Optimisation profile of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    Debug,
    Release,
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Release => write!(f, "release"),
        }
    }
}

impl FromStr for BuildType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            _ => Err(ParseError::InvalidProfile {
                path: String::new(),
                message: format!("unknown build type: {s}"),
            }),
        }
    }
}

/// Host, build type, and tool description for a build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub basename: String,
    pub host: HostInfo,
    pub build_type: BuildType,
    /// Tools keyed by stable id (`dc`, `cc`, `cxx`, `msvc`);
    /// the map is ordered so serialization is canonical.
    pub tools: BTreeMap<String, Tool>,
}

impl Profile {
    /// Assemble a profile from parts.
    #[must_use]
    pub fn new(
        basename: impl Into<String>,
        host: HostInfo,
        build_type: BuildType,
        tools: BTreeMap<String, Tool>,
    ) -> Self {
        Self {
            basename: basename.into(),
            host,
            build_type,
            tools,
        }
    }

    /// Detect the current host and the tools for `langs`.
    ///
    /// # Errors
    ///
    /// Returns an error when a compiler for one of `langs` cannot be
    /// found or probed.
    pub fn detect(basename: impl Into<String>, langs: &BTreeSet<Lang>) -> Result<Self, Error> {
        let host = HostInfo::current();
        let mut tools = BTreeMap::new();
        for lang in langs {
            let tool = Tool::detect(*lang)?;
            tools.insert(tool.id.clone(), tool);
        }
        let profile = Self::new(basename, host, BuildType::Debug, tools);
        info!(profile = %profile.name(), digest = %profile.digest_hash(), "detected profile");
        Ok(profile)
    }

    /// Full display name, `basename-buildtype`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}-{}", self.basename, self.build_type)
    }

    /// SHA-1 digest over the canonical field ordering.
    ///
    /// The basename is a label and deliberately not part of the digest;
    /// everything observable by a build is.
    #[must_use]
    pub fn digest_hash(&self) -> String {
        let mut hasher = Sha1::new();
        feed(&mut hasher, "os", &self.host.os.to_string());
        feed(&mut hasher, "arch", &self.host.arch.to_string());
        feed(&mut hasher, "build-type", &self.build_type.to_string());
        for (id, tool) in &self.tools {
            feed(&mut hasher, "tool", id);
            feed(&mut hasher, "name", &tool.name);
            feed(
                &mut hasher,
                "version",
                &tool
                    .version
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            );
            feed(&mut hasher, "path", &tool.path.display().to_string());
            if let Some(msvc) = &tool.msvc {
                feed(&mut hasher, "msvc-line", &msvc.line_version);
                feed(&mut hasher, "msvc-display", &msvc.display);
            }
        }
        hex::encode(hasher.finalize())
    }

    /// Whether a tool for `lang` is present.
    #[must_use]
    pub fn supports(&self, lang: Lang) -> bool {
        self.tools.contains_key(lang.tool_id())
    }

    /// Whether every language in `langs` is supported.
    #[must_use]
    pub fn supports_all<'a>(&self, langs: impl IntoIterator<Item = &'a Lang>) -> bool {
        langs.into_iter().all(|lang| self.supports(*lang))
    }

    /// A profile containing only the tools required for `langs`.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::MissingTool` when a language has no tool in
    /// this profile.
    pub fn subset(&self, langs: &BTreeSet<Lang>) -> Result<Self, Error> {
        let mut tools = BTreeMap::new();
        for lang in langs {
            let id = lang.tool_id();
            let tool = self.tools.get(id).ok_or_else(|| BuildError::MissingTool {
                lang: lang.to_string(),
                profile: self.name(),
            })?;
            tools.insert(id.to_string(), tool.clone());
        }
        // MSVC rides along whenever a native language is requested
        if let Some(msvc) = self.tools.get("msvc") {
            if langs.contains(&Lang::C) || langs.contains(&Lang::Cxx) {
                tools.insert("msvc".to_string(), msvc.clone());
            }
        }
        Ok(Self::new(
            self.basename.clone(),
            self.host,
            self.build_type,
            tools,
        ))
    }

    /// The same profile with another build type.
    #[must_use]
    pub fn with_build_type(&self, build_type: BuildType) -> Self {
        let mut profile = self.clone();
        profile.build_type = build_type;
        profile
    }

    /// Environment variables a build run needs (`DC`, `CC`, `CXX`, MSVC
    /// paths).
    #[must_use]
    pub fn collect_environment(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for lang in [Lang::D, Lang::C, Lang::Cxx] {
            if let Some(tool) = self.tools.get(lang.tool_id()) {
                env.insert(
                    lang.env_var().to_string(),
                    tool.path.display().to_string(),
                );
            }
        }
        if let Some(msvc) = self.tools.get("msvc") {
            env.insert("MSVC".to_string(), msvc.path.display().to_string());
            if let Some(info) = &msvc.msvc {
                env.insert("MSVC_LINE".to_string(), info.line_version.clone());
            }
        }
        env.insert("DOP_BUILD_TYPE".to_string(), self.build_type.to_string());
        env
    }

    /// Write the profile as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the write fails.
    pub fn save_to(&self, path: &Path) -> Result<(), Error> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| Error::internal(format!("profile serialize error: {e}")))?;
        std::fs::write(path, text).map_err(|e| Error::io_with_path(&e, path))?;
        Ok(())
    }

    /// Read a profile back from TOML.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidProfile` on malformed content.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(&e, path))?;
        let profile = toml::from_str(&text).map_err(|e| ParseError::InvalidProfile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(profile)
    }
}

fn feed(hasher: &mut Sha1, key: &str, value: &str) {
    hasher.update(key.as_bytes());
    hasher.update([0u8]);
    hasher.update(value.as_bytes());
    hasher.update([0u8]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dop_types::Version;
    use std::path::PathBuf;

    fn sample_profile() -> Profile {
        let mut tools = BTreeMap::new();
        tools.insert(
            "dc".to_string(),
            Tool {
                id: "dc".to_string(),
                name: "dmd".to_string(),
                version: Some(Version::new(2, 109, 1)),
                path: PathBuf::from("/usr/bin/dmd"),
                msvc: None,
            },
        );
        tools.insert(
            "cc".to_string(),
            Tool {
                id: "cc".to_string(),
                name: "gcc".to_string(),
                version: Some(Version::new(13, 2, 0)),
                path: PathBuf::from("/usr/bin/gcc"),
                msvc: None,
            },
        );
        Profile::new(
            "default",
            HostInfo {
                os: Os::Linux,
                arch: Arch::X86_64,
            },
            BuildType::Debug,
            tools,
        )
    }

    #[test]
    fn test_digest_is_40_hex() {
        let digest = sample_profile().digest_hash();
        assert_eq!(digest.len(), 40);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_changes_with_build_type() {
        let profile = sample_profile();
        let release = profile.with_build_type(BuildType::Release);
        assert_ne!(profile.digest_hash(), release.digest_hash());
    }

    #[test]
    fn test_digest_changes_with_tool_version() {
        let profile = sample_profile();
        let mut other = profile.clone();
        other.tools.get_mut("dc").unwrap().version = Some(Version::new(2, 110, 0));
        assert_ne!(profile.digest_hash(), other.digest_hash());
    }

    #[test]
    fn test_digest_ignores_basename() {
        let profile = sample_profile();
        let mut renamed = profile.clone();
        renamed.basename = "other".to_string();
        assert_eq!(profile.digest_hash(), renamed.digest_hash());
    }

    #[test]
    fn test_toml_round_trip_preserves_digest() {
        let profile = sample_profile();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile-default.toml");
        profile.save_to(&path).unwrap();
        let loaded = Profile::load_from(&path).unwrap();
        assert_eq!(loaded, profile);
        assert_eq!(loaded.digest_hash(), profile.digest_hash());
    }

    #[test]
    fn test_subset_recomputes_digest() {
        let profile = sample_profile();
        let mut langs = BTreeSet::new();
        langs.insert(Lang::D);
        let sub = profile.subset(&langs).unwrap();
        assert_eq!(sub.tools.len(), 1);
        assert_ne!(sub.digest_hash(), profile.digest_hash());

        let mut missing = BTreeSet::new();
        missing.insert(Lang::Cxx);
        assert!(profile.subset(&missing).is_err());
    }

    #[test]
    fn test_collect_environment() {
        let env = sample_profile().collect_environment();
        assert_eq!(env.get("DC").map(String::as_str), Some("/usr/bin/dmd"));
        assert_eq!(env.get("CC").map(String::as_str), Some("/usr/bin/gcc"));
        assert_eq!(env.get("DOP_BUILD_TYPE").map(String::as_str), Some("debug"));
    }
}
