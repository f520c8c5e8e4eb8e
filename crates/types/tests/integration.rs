//! Property tests for version ordering and spec matching

use dop_types::{AvailVersion, Location, Version, VersionSpec};
use proptest::prelude::*;

fn arb_version() -> impl Strategy<Value = Version> {
    (0u64..20, 0u64..20, 0u64..20).prop_map(|(ma, mi, pa)| Version::new(ma, mi, pa))
}

proptest! {
    #[test]
    fn compare_is_antisymmetric(a in arb_version(), b in arb_version()) {
        prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    }

    #[test]
    fn compare_is_total(a in arb_version(), b in arb_version(), c in arb_version()) {
        // transitivity over a sorted triple
        let mut sorted = vec![a, b, c];
        sorted.sort();
        prop_assert!(sorted[0] <= sorted[1] && sorted[1] <= sorted[2]);
        prop_assert!(sorted[0] <= sorted[2]);
    }

    #[test]
    fn avail_version_order_puts_location_last(
        v in arb_version(),
    ) {
        let sys = AvailVersion::new(v.clone(), Location::System);
        let cache = AvailVersion::new(v.clone(), Location::Cache);
        let net = AvailVersion::new(v, Location::Network);
        prop_assert!(sys < cache && cache < net);
    }

    #[test]
    fn compound_matching_is_contiguous(
        a in arb_version(),
        b in arb_version(),
        probe in arb_version(),
    ) {
        prop_assume!(a < b);
        let spec = VersionSpec::Compound {
            lower: a.clone(),
            lower_included: true,
            upper: b.clone(),
            upper_included: false,
        };
        let expected = probe >= a && probe < b;
        prop_assert_eq!(spec.matches(&probe), expected);
    }

    #[test]
    fn spec_display_round_trips(a in arb_version(), b in arb_version()) {
        prop_assume!(a < b);
        let specs = vec![
            VersionSpec::MatchAll,
            VersionSpec::Equals(a.clone()),
            VersionSpec::GreaterThan { version: a.clone(), included: true },
            VersionSpec::LessThan { version: b.clone(), included: false },
            VersionSpec::Compound {
                lower: a,
                lower_included: true,
                upper: b,
                upper_included: false,
            },
        ];
        for spec in specs {
            let rendered = spec.to_string();
            let reparsed: VersionSpec = rendered.parse().unwrap();
            prop_assert_eq!(spec, reparsed);
        }
    }
}
