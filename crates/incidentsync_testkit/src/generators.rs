//! Property-based test generators using proptest.

use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for incident ids in a realistic range.
pub fn incident_id_strategy() -> impl Strategy<Value = u64> {
    1u64..1_000_000
}

/// Strategy for a run of sink outcomes, `true` meaning the ticket was created.
pub fn delivery_outcomes_strategy(max_len: usize) -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..=max_len.max(1))
}

/// Strategy for a strictly increasing batch of incident ids.
pub fn ascending_ids_strategy(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::btree_set(incident_id_strategy(), 1..=max_len.max(1))
        .prop_map(|ids| ids.into_iter().collect())
}

/// Strategy for failure-file content mixing valid ids, duplicates, blanks,
/// padding and garbage tokens, paired with the set a tolerant parser must
/// produce.
pub fn failure_file_strategy() -> impl Strategy<Value = (String, BTreeSet<u64>)> {
    let token = prop_oneof![
        4 => (0u64..10_000).prop_map(|id| (format!("{id}"), Some(id))),
        1 => (0u64..10_000).prop_map(|id| (format!(" {id} "), Some(id))),
        1 => Just((String::new(), None)),
        1 => "[a-z]{1,6}".prop_map(|s| (s, None)),
        1 => Just(("-3".to_string(), None)),
    ];
    prop::collection::vec(token, 0..20).prop_map(|tokens| {
        let expected = tokens.iter().filter_map(|(_, id)| *id).collect();
        let content = tokens
            .into_iter()
            .map(|(text, _)| text)
            .collect::<Vec<_>>()
            .join(",");
        (content, expected)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use incidentsync_state::parse_failure_list;

    proptest! {
        #[test]
        fn failure_file_parses_to_expected_set((content, expected) in failure_file_strategy()) {
            prop_assert_eq!(parse_failure_list(&content), expected);
        }

        #[test]
        fn ascending_ids_are_sorted(ids in ascending_ids_strategy(20)) {
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
