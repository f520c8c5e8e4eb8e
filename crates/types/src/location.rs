//! Where a package version is known to exist

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source of availability for a package version
///
/// The derived order (`System < Cache < Network`) is the tie-break order
/// used when sorting candidate lists.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    System,
    Cache,
    Network,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A version known to exist at a specific location
///
/// A package may carry the same version at several locations; candidate
/// lists are kept sorted ascending by `(version, location)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailVersion {
    pub version: Version,
    pub location: Location,
}

impl AvailVersion {
    #[must_use]
    pub fn new(version: Version, location: Location) -> Self {
        Self { version, location }
    }
}

impl PartialOrd for AvailVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AvailVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.version
            .cmp(&other.version)
            .then(self.location.cmp(&other.location))
    }
}

impl fmt::Display for AvailVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.version, self.location)
    }
}
