//! Property-based tests for core domain types and progress accounting.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use shopcli::core::types::{Entity, ShopId};
use shopcli::transfer::DeltaTracker;
use shopcli::ui::output::format_bytes;

/// Strategy for generating valid shop id characters.
fn shop_id_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('A', 'Z'),
        prop::char::range('0', '9'),
        Just('-'),
        Just('_'),
    ]
}

proptest! {
    /// The deltas handed to a bar always add up to the largest cumulative
    /// value reported, however the values arrive.
    #[test]
    fn deltas_sum_to_running_maximum(values in prop::collection::vec(0u64..1_000_000, 0..50)) {
        let mut tracker = DeltaTracker::new();
        let mut sum = 0u64;
        for value in &values {
            sum += tracker.advance(*value);
        }

        let max = values.iter().copied().max().unwrap_or(0);
        prop_assert_eq!(sum, max);
        prop_assert_eq!(tracker.total(), max);
    }

    /// Monotonic input passes through as the exact differences.
    #[test]
    fn monotonic_values_yield_differences(
        mut values in prop::collection::vec(0u64..1_000_000, 1..50),
    ) {
        values.sort_unstable();
        let mut tracker = DeltaTracker::new();
        let mut previous = 0u64;
        for value in values {
            prop_assert_eq!(tracker.advance(value), value - previous);
            previous = value;
        }
    }

    #[test]
    fn shop_ids_survive_surrounding_whitespace(
        chars in prop::collection::vec(shop_id_char(), 1..30),
        pad in "[ \t]{0,3}",
    ) {
        let id: String = chars.into_iter().collect();
        let parsed = ShopId::new(format!("{}{}{}", pad, id, pad)).unwrap();
        prop_assert_eq!(parsed.as_str(), id.as_str());
    }

    #[test]
    fn shop_ids_reject_path_and_query_characters(
        prefix in "[a-z0-9]{1,5}",
        bad in prop_oneof![Just('/'), Just('?'), Just('#'), Just(' ')],
        suffix in "[a-z0-9]{1,5}",
    ) {
        // Non-empty on both sides, so trimming cannot remove a space.
        let candidate = format!("{}{}{}", prefix, bad, suffix);
        prop_assert!(ShopId::new(candidate).is_err());
    }

    #[test]
    fn entity_parsing_ignores_case(index in 0..Entity::ALL.len(), upper in any::<bool>()) {
        let entity = Entity::ALL[index];
        let text = if upper {
            entity.as_str().to_ascii_uppercase()
        } else {
            entity.as_str().to_string()
        };
        prop_assert_eq!(text.parse::<Entity>().unwrap(), entity);
    }

    #[test]
    fn format_bytes_never_panics(bytes in any::<u64>()) {
        let text = format_bytes(bytes);
        prop_assert!(!text.is_empty());
    }
}
