//! Version selection policy
//!
//! Given a sorted candidate list, a [`Heuristics`] value deterministically
//! scores every candidate and picks the winner. The scales are spread far
//! enough apart that location preference, version rank, and mode never
//! fight each other unintentionally.

use dop_types::{AvailVersion, Location};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which candidate wins when several are eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeuristicMode {
    /// Favour versions already installed on the system
    PreferSystem,
    /// Favour versions already in the recipe cache
    PreferCache,
    /// Favour anything local (cache slightly over system) over the network
    PreferLocal,
    /// Favour the highest version wherever it lives
    PickHighest,
}

/// Whether system-provided packages may satisfy dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemPolicy {
    Allow,
    Disallow,
    /// Only packages in `system_list`
    AllowedList,
    /// Every package except those in `system_list`
    DisallowedList,
}

/// Version-selection policy for a DAG resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heuristics {
    pub mode: HeuristicMode,
    pub system: SystemPolicy,
    #[serde(
        rename = "system-list",
        default,
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub system_list: BTreeSet<String>,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            mode: HeuristicMode::PreferCache,
            system: SystemPolicy::Allow,
            system_list: BTreeSet::new(),
        }
    }
}

impl Heuristics {
    #[must_use]
    pub fn new(mode: HeuristicMode, system: SystemPolicy) -> Self {
        Self {
            mode,
            system,
            system_list: BTreeSet::new(),
        }
    }

    /// Whether a system-provided `name` may satisfy dependencies.
    #[must_use]
    pub fn allow_system_for(&self, name: &str) -> bool {
        match self.system {
            SystemPolicy::Allow => true,
            SystemPolicy::Disallow => false,
            SystemPolicy::AllowedList => self.system_list.contains(name),
            SystemPolicy::DisallowedList => !self.system_list.contains(name),
        }
    }

    /// Pick the winning candidate from a list sorted ascending by
    /// `(version, location)`.
    ///
    /// Deterministic: the result depends only on the input list and this
    /// value. Ties break towards the higher version, then the better
    /// located candidate.
    #[must_use]
    pub fn choose_version(&self, sorted: &[AvailVersion]) -> Option<AvailVersion> {
        let count = u64::try_from(sorted.len()).ok()?;
        if count == 0 {
            return None;
        }
        let high = 10 * count;
        let mid = 5 * count;

        let (system_score, cache_score, bump) = match self.mode {
            HeuristicMode::PreferSystem => (high, mid, 1),
            HeuristicMode::PreferCache => (mid, high, 1),
            HeuristicMode::PreferLocal => (high, high + 1, 2),
            HeuristicMode::PickHighest => (1, mid, high),
        };

        let mut best: Option<(u64, &AvailVersion)> = None;
        let mut version_rank = 0u64;
        let mut previous_version = None;

        for candidate in sorted {
            if previous_version.is_some_and(|prev| prev != &candidate.version) {
                version_rank += 1;
            }
            previous_version = Some(&candidate.version);

            let location_score = match candidate.location {
                Location::System => system_score,
                Location::Cache => cache_score,
                Location::Network => 0,
            };
            let score = location_score + version_rank * bump;

            let better = match &best {
                None => true,
                Some((best_score, best_cand)) => {
                    score > *best_score
                        || (score == *best_score && candidate.version > best_cand.version)
                }
            };
            if better {
                best = Some((score, candidate));
            }
        }

        best.map(|(_, candidate)| candidate.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dop_types::Version;

    fn avail(version: &str, location: Location) -> AvailVersion {
        AvailVersion::new(Version::parse(version).unwrap(), location)
    }

    fn all_locations(versions: &[&str]) -> Vec<AvailVersion> {
        let mut out = Vec::new();
        for v in versions {
            out.push(avail(v, Location::System));
            out.push(avail(v, Location::Cache));
            out.push(avail(v, Location::Network));
        }
        out.sort();
        out
    }

    #[test]
    fn test_prefer_system_takes_highest_system() {
        let h = Heuristics::new(HeuristicMode::PreferSystem, SystemPolicy::Allow);
        let candidates = all_locations(&["1.0.0", "2.0.0", "3.0.0"]);
        let pick = h.choose_version(&candidates).unwrap();
        assert_eq!(pick, avail("3.0.0", Location::System));
    }

    #[test]
    fn test_prefer_cache_takes_cached_over_newer() {
        let h = Heuristics::new(HeuristicMode::PreferCache, SystemPolicy::Allow);
        let candidates = vec![
            avail("1.0.0", Location::Cache),
            avail("2.0.0", Location::System),
            avail("3.0.0", Location::Network),
        ];
        let pick = h.choose_version(&candidates).unwrap();
        assert_eq!(pick, avail("1.0.0", Location::Cache));
    }

    #[test]
    fn test_pick_highest_goes_to_network() {
        let h = Heuristics::new(HeuristicMode::PickHighest, SystemPolicy::Allow);
        let candidates = vec![
            avail("1.0.0", Location::Cache),
            avail("2.0.0", Location::System),
            avail("3.0.0", Location::Network),
        ];
        let pick = h.choose_version(&candidates).unwrap();
        assert_eq!(pick, avail("3.0.0", Location::Network));
    }

    #[test]
    fn test_empty_candidates() {
        let h = Heuristics::default();
        assert_eq!(h.choose_version(&[]), None);
    }

    #[test]
    fn test_system_policy() {
        let mut h = Heuristics::new(HeuristicMode::PreferSystem, SystemPolicy::AllowedList);
        h.system_list.insert("zlib".to_string());
        assert!(h.allow_system_for("zlib"));
        assert!(!h.allow_system_for("curl"));

        h.system = SystemPolicy::DisallowedList;
        assert!(!h.allow_system_for("zlib"));
        assert!(h.allow_system_for("curl"));
    }
}
