//! Package naming and dependency specifications

use crate::version::VersionSpec;
use dop_errors::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Value of a recipe build option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Recipe build options, sorted by key for deterministic digests
pub type Options = BTreeMap<String, OptionValue>;

/// A dependency declaration: package name, version requirement, options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepSpec {
    pub name: String,
    pub spec: VersionSpec,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: Options,
}

impl DepSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, spec: VersionSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            options: BTreeMap::new(),
        }
    }
}

impl fmt::Display for DepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.spec)
    }
}

impl FromStr for DepSpec {
    type Err = ParseError;

    /// Parse the `"name spec"` shorthand; a bare name means any version.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(char::is_whitespace) {
            Some((name, spec)) => {
                validate_name(name)?;
                Ok(Self::new(name, spec.trim().parse()?))
            }
            None => {
                validate_name(s)?;
                Ok(Self::new(s, VersionSpec::MatchAll))
            }
        }
    }
}

/// Validate a package name: lowercase alphanumeric plus `-` and `_`,
/// starting with a letter.
///
/// # Errors
///
/// Returns `ParseError::InvalidSpec` naming the offending input.
pub fn validate_name(name: &str) -> Result<(), ParseError> {
    let ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ParseError::InvalidSpec {
            input: format!("invalid package name: {name}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand() {
        let dep: DepSpec = "pkg-a >=1.0.0".parse().unwrap();
        assert_eq!(dep.name, "pkg-a");
        assert_eq!(dep.spec, ">=1.0.0".parse().unwrap());

        let dep: DepSpec = "pkg-a".parse().unwrap();
        assert_eq!(dep.spec, VersionSpec::MatchAll);
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("pkg-a").is_ok());
        assert!(validate_name("zlib2").is_ok());
        assert!(validate_name("Bad").is_err());
        assert!(validate_name("1pkg").is_err());
        assert!(validate_name("").is_err());
    }
}
