//! Version specification parsing and matching
//!
//! Implements the version requirement syntax accepted in recipes and
//! lock files:
//! - `*` - any release version
//! - `~>1.2.3` - bounded by the next minor (`>=1.2.3 <1.3.0-0`)
//! - `~>1.2` - bounded by the next major (`>=1.2.0 <2.0.0-0`)
//! - `^1.2.3` - compatible with the leftmost non-zero component
//! - `==1.2.3` or bare `1.2.3` - exact version
//! - `>1.0`, `>=1.0`, `<2.0`, `<=2.0` - half-open ranges
//! - `>=1.2.3 <3.0.0` - compound range

use dop_errors::ParseError;
use semver::{Prerelease, Version};
use std::fmt;
use std::str::FromStr;

/// A version requirement as written in a recipe dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// `*` - matches every release version
    MatchAll,
    /// `^X.Y.Z` / `^X.Y` - compatible with the leftmost non-zero component
    Caret { base: Version, minor_only: bool },
    /// `~>X.Y.Z` / `~>X.Y` - bounded by the next minor / major
    Tilde { base: Version, minor_only: bool },
    /// `==X.Y.Z` or bare `X.Y.Z`
    Equals(Version),
    /// `>X.Y.Z` / `>=X.Y.Z`
    GreaterThan { version: Version, included: bool },
    /// `<X.Y.Z` / `<=X.Y.Z`
    LessThan { version: Version, included: bool },
    /// `>=A <B` - explicit two-sided range
    Compound {
        lower: Version,
        lower_included: bool,
        upper: Version,
        upper_included: bool,
    },
}

impl VersionSpec {
    /// Check whether `version` satisfies this spec.
    ///
    /// A prerelease version is only eligible when the anchoring bound of the
    /// spec itself carries a prerelease tag; `*` never matches prereleases.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        if !version.pre.is_empty() && !self.admits_prerelease() {
            return false;
        }
        match self {
            Self::MatchAll => true,
            Self::Equals(base) => version.cmp_precedence(base) == std::cmp::Ordering::Equal,
            Self::Caret { base, minor_only } => in_range(
                version,
                base,
                true,
                &caret_upper(base, *minor_only),
                false,
            ),
            Self::Tilde { base, minor_only } => in_range(
                version,
                base,
                true,
                &tilde_upper(base, *minor_only),
                false,
            ),
            Self::GreaterThan {
                version: bound,
                included,
            } => match version.cmp_precedence(bound) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Equal => *included,
                std::cmp::Ordering::Less => false,
            },
            Self::LessThan {
                version: bound,
                included,
            } => match version.cmp_precedence(bound) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Equal => *included,
                std::cmp::Ordering::Greater => false,
            },
            Self::Compound {
                lower,
                lower_included,
                upper,
                upper_included,
            } => in_range(version, lower, *lower_included, upper, *upper_included),
        }
    }

    /// The bound whose prerelease tag opts prerelease versions in.
    fn admits_prerelease(&self) -> bool {
        match self {
            Self::MatchAll => false,
            Self::Caret { base, .. } | Self::Tilde { base, .. } | Self::Equals(base) => {
                !base.pre.is_empty()
            }
            Self::GreaterThan { version, .. } | Self::LessThan { version, .. } => {
                !version.pre.is_empty()
            }
            Self::Compound { lower, .. } => !lower.pre.is_empty(),
        }
    }
}

fn in_range(
    version: &Version,
    lower: &Version,
    lower_included: bool,
    upper: &Version,
    upper_included: bool,
) -> bool {
    let lo = match version.cmp_precedence(lower) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Equal => lower_included,
        std::cmp::Ordering::Less => false,
    };
    let hi = match version.cmp_precedence(upper) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Equal => upper_included,
        std::cmp::Ordering::Greater => false,
    };
    lo && hi
}

/// Exclusive upper bound for `~>`: next minor for `X.Y.Z`, next major for `X.Y`.
///
/// The bound carries the `-0` prerelease so that prereleases of the bound
/// itself fall outside the range.
fn tilde_upper(base: &Version, minor_only: bool) -> Version {
    let mut upper = if minor_only {
        Version::new(base.major + 1, 0, 0)
    } else {
        Version::new(base.major, base.minor + 1, 0)
    };
    upper.pre = Prerelease::new("0").unwrap_or(Prerelease::EMPTY);
    upper
}

/// Exclusive upper bound for `^`: bump the leftmost non-zero component.
fn caret_upper(base: &Version, minor_only: bool) -> Version {
    let mut upper = if base.major > 0 {
        Version::new(base.major + 1, 0, 0)
    } else if base.minor > 0 {
        Version::new(0, base.minor + 1, 0)
    } else if minor_only {
        // ^0.0 covers the whole 0.0.x series
        Version::new(0, 1, 0)
    } else {
        Version::new(0, 0, base.patch + 1)
    };
    upper.pre = Prerelease::new("0").unwrap_or(Prerelease::EMPTY);
    upper
}

/// Parse `X.Y.Z[-pre]` or `X.Y`, reporting whether the patch was omitted.
fn parse_partial(input: &str) -> Result<(Version, bool), ParseError> {
    let invalid = || ParseError::InvalidSpec {
        input: input.to_string(),
    };
    match input.bytes().filter(|b| *b == b'.').count() {
        1 => {
            let (major, minor) = input.split_once('.').ok_or_else(invalid)?;
            let major: u64 = major.parse().map_err(|_| invalid())?;
            let minor: u64 = minor.parse().map_err(|_| invalid())?;
            Ok((Version::new(major, minor, 0), true))
        }
        2 => {
            let version = Version::parse(input).map_err(|_| invalid())?;
            Ok((version, false))
        }
        _ => Err(invalid()),
    }
}

fn parse_full(input: &str) -> Result<Version, ParseError> {
    Version::parse(input).map_err(|_| ParseError::InvalidSpec {
        input: input.to_string(),
    })
}

impl FromStr for VersionSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s == "*" {
            return Ok(Self::MatchAll);
        }

        // Compound range: ">=A <B" (whitespace separated)
        if let Some((first, second)) = s.split_once(char::is_whitespace) {
            let (first, second) = (first.trim(), second.trim());
            let (lower, lower_included) = if let Some(v) = first.strip_prefix(">=") {
                (parse_full(v.trim())?, true)
            } else if let Some(v) = first.strip_prefix('>') {
                (parse_full(v.trim())?, false)
            } else {
                return Err(ParseError::InvalidSpec {
                    input: s.to_string(),
                });
            };
            let (upper, upper_included) = if let Some(v) = second.strip_prefix("<=") {
                (parse_full(v.trim())?, true)
            } else if let Some(v) = second.strip_prefix('<') {
                (parse_full(v.trim())?, false)
            } else {
                return Err(ParseError::InvalidSpec {
                    input: s.to_string(),
                });
            };
            return Ok(Self::Compound {
                lower,
                lower_included,
                upper,
                upper_included,
            });
        }

        if let Some(v) = s.strip_prefix("~>") {
            let (base, minor_only) = parse_partial(v.trim())?;
            return Ok(Self::Tilde { base, minor_only });
        }
        if let Some(v) = s.strip_prefix('^') {
            let (base, minor_only) = parse_partial(v.trim())?;
            return Ok(Self::Caret { base, minor_only });
        }
        if let Some(v) = s.strip_prefix("==") {
            return Ok(Self::Equals(parse_full(v.trim())?));
        }
        if let Some(v) = s.strip_prefix(">=") {
            return Ok(Self::GreaterThan {
                version: parse_full(v.trim())?,
                included: true,
            });
        }
        if let Some(v) = s.strip_prefix("<=") {
            return Ok(Self::LessThan {
                version: parse_full(v.trim())?,
                included: true,
            });
        }
        if let Some(v) = s.strip_prefix('>') {
            return Ok(Self::GreaterThan {
                version: parse_full(v.trim())?,
                included: false,
            });
        }
        if let Some(v) = s.strip_prefix('<') {
            return Ok(Self::LessThan {
                version: parse_full(v.trim())?,
                included: false,
            });
        }

        // Bare version means exact match
        Ok(Self::Equals(parse_full(s)?))
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MatchAll => write!(f, "*"),
            Self::Caret { base, minor_only } => {
                if *minor_only {
                    write!(f, "^{}.{}", base.major, base.minor)
                } else {
                    write!(f, "^{base}")
                }
            }
            Self::Tilde { base, minor_only } => {
                if *minor_only {
                    write!(f, "~>{}.{}", base.major, base.minor)
                } else {
                    write!(f, "~>{base}")
                }
            }
            Self::Equals(base) => write!(f, "=={base}"),
            Self::GreaterThan { version, included } => {
                write!(f, "{}{version}", if *included { ">=" } else { ">" })
            }
            Self::LessThan { version, included } => {
                write!(f, "{}{version}", if *included { "<=" } else { "<" })
            }
            Self::Compound {
                lower,
                lower_included,
                upper,
                upper_included,
            } => write!(
                f,
                "{}{lower} {}{upper}",
                if *lower_included { ">=" } else { ">" },
                if *upper_included { "<=" } else { "<" },
            ),
        }
    }
}

impl serde::Serialize for VersionSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for VersionSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn spec(s: &str) -> VersionSpec {
        s.parse().unwrap()
    }

    #[test]
    fn test_match_all() {
        let s = spec("*");
        assert!(s.matches(&v("0.0.1")));
        assert!(s.matches(&v("999.999.999")));
        assert!(!s.matches(&v("1.0.0-beta")));
    }

    #[test]
    fn test_tilde_patch() {
        let s = spec("~>1.2.3");
        assert!(s.matches(&v("1.2.3")));
        assert!(s.matches(&v("1.2.9")));
        assert!(!s.matches(&v("1.3.0")));
        assert!(!s.matches(&v("1.2.2")));
        assert!(!s.matches(&v("1.2.3-beta")));
    }

    #[test]
    fn test_tilde_minor() {
        let s = spec("~>1.2");
        assert!(s.matches(&v("1.2.0")));
        assert!(s.matches(&v("1.9.9")));
        assert!(!s.matches(&v("2.0.0")));
        assert!(!s.matches(&v("1.1.9")));
    }

    #[test]
    fn test_caret() {
        let s = spec("^1.2.3");
        assert!(s.matches(&v("1.2.3")));
        assert!(s.matches(&v("1.9.0")));
        assert!(!s.matches(&v("2.0.0")));
        assert!(!s.matches(&v("1.2.2")));

        let s = spec("^0.2.3");
        assert!(s.matches(&v("0.2.9")));
        assert!(!s.matches(&v("0.3.0")));

        let s = spec("^0.0.3");
        assert!(s.matches(&v("0.0.3")));
        assert!(!s.matches(&v("0.0.4")));
    }

    #[test]
    fn test_equals_and_bare() {
        assert_eq!(spec("==1.2.3"), spec("1.2.3"));
        let s = spec("1.2.3");
        assert!(s.matches(&v("1.2.3")));
        assert!(!s.matches(&v("1.2.4")));
    }

    #[test]
    fn test_half_open() {
        let s = spec(">=1.2.0");
        assert!(s.matches(&v("1.2.0")));
        assert!(s.matches(&v("9.0.0")));
        assert!(!s.matches(&v("1.1.9")));

        let s = spec(">1.2.0");
        assert!(!s.matches(&v("1.2.0")));

        let s = spec("<=2.0.0");
        assert!(s.matches(&v("2.0.0")));
        assert!(!s.matches(&v("2.0.1")));

        let s = spec("<2.0.0");
        assert!(!s.matches(&v("2.0.0")));
        assert!(s.matches(&v("1.9.9")));
    }

    #[test]
    fn test_compound() {
        let s = spec(">=1.2.3 <3.0.0");
        assert!(s.matches(&v("1.2.3")));
        assert!(s.matches(&v("2.0.0")));
        assert!(!s.matches(&v("3.0.0")));
        assert!(!s.matches(&v("5.0.0")));
        assert!(!s.matches(&v("5.0.0-beta")));
    }

    #[test]
    fn test_prerelease_opt_in() {
        let s = spec(">=1.0.0-alpha");
        assert!(s.matches(&v("1.0.0-beta")));
        assert!(s.matches(&v("1.0.0")));
        assert!(!spec(">=1.0.0").matches(&v("1.0.1-beta")));
    }

    #[test]
    fn test_display_round_trip() {
        for input in [
            "*",
            "^1.2.3",
            "^1.2",
            "~>1.2.3",
            "~>1.2",
            "==1.2.3",
            ">=1.0.0",
            ">1.0.0",
            "<=2.0.0",
            "<2.0.0",
            ">=1.2.3 <3.0.0",
        ] {
            let parsed = spec(input);
            assert_eq!(parsed, spec(&parsed.to_string()), "round-trip of {input}");
        }
    }

    #[test]
    fn test_invalid() {
        assert!("".parse::<VersionSpec>().is_err());
        assert!("~>1".parse::<VersionSpec>().is_err());
        assert!("abc".parse::<VersionSpec>().is_err());
        assert!(">= <1.0.0".parse::<VersionSpec>().is_err());
    }
}
