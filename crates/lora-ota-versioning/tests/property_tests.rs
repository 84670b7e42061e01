//! Property-based tests for version ordering

use lora_ota_versioning::{FirmwareVersion, compare};
use proptest::prelude::*;
use std::cmp::Ordering;

fn arb_components() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..10_000, 1..6)
}

fn render(components: &[u64]) -> String {
    components
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_parse_roundtrips_components(components in arb_components()) {
        let text = render(&components);
        let parsed = FirmwareVersion::parse(&text)
            .map_err(|e| TestCaseError::fail(format!("parse failed: {e}")))?;
        prop_assert_eq!(parsed.components(), components.as_slice());
    }

    #[test]
    fn prop_compare_is_antisymmetric(a in arb_components(), b in arb_components()) {
        let (sa, sb) = (render(&a), render(&b));
        let ab = compare(&sa, &sb).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let ba = compare(&sb, &sa).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(ab, ba.reverse());
    }

    #[test]
    fn prop_compare_matches_numeric_order(a in arb_components(), b in arb_components()) {
        let ordering = compare(&render(&a), &render(&b))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(ordering, a.cmp(&b));
    }

    #[test]
    fn prop_extension_is_newer(base in arb_components(), extra in 0u64..100) {
        let mut longer = base.clone();
        longer.push(extra);
        let ordering = compare(&render(&longer), &render(&base))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(ordering, Ordering::Greater);
    }

    #[test]
    fn prop_garbage_never_panics(s in "\\PC{0,24}") {
        if let Ok(v) = FirmwareVersion::parse(&s) {
            prop_assert!(!v.components().is_empty());
        }
    }
}
