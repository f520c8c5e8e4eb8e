//! Source languages a recipe can declare

use dop_errors::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A language a package is built from
///
/// The order is the canonical aggregation order used in lock files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    D,
    C,
    Cxx,
}

impl Lang {
    /// Identifier of the tool that builds this language
    #[must_use]
    pub fn tool_id(self) -> &'static str {
        match self {
            Self::D => "dc",
            Self::C => "cc",
            Self::Cxx => "cxx",
        }
    }

    /// Environment variable naming the compiler for build steps
    #[must_use]
    pub fn env_var(self) -> &'static str {
        match self {
            Self::D => "DC",
            Self::C => "CC",
            Self::Cxx => "CXX",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::D => write!(f, "d"),
            Self::C => write!(f, "c"),
            Self::Cxx => write!(f, "cxx"),
        }
    }
}

impl FromStr for Lang {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "d" => Ok(Self::D),
            "c" => Ok(Self::C),
            "cxx" | "c++" => Ok(Self::Cxx),
            _ => Err(ParseError::InvalidVersion {
                input: format!("unknown language: {s}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("d".parse::<Lang>().unwrap(), Lang::D);
        assert_eq!("c++".parse::<Lang>().unwrap(), Lang::Cxx);
        assert_eq!(Lang::Cxx.to_string(), "cxx");
    }

    #[test]
    fn test_canonical_order() {
        let mut langs = vec![Lang::Cxx, Lang::D, Lang::C];
        langs.sort();
        assert_eq!(langs, vec![Lang::D, Lang::C, Lang::Cxx]);
    }
}
