//! Property-based tests for the triage reducer

use super::*;
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_field() -> impl Strategy<Value = TriageField> {
    prop_oneof![
        Just(TriageField::Name),
        Just(TriageField::BirthDate),
        Just(TriageField::BirthTime),
        Just(TriageField::Place),
        Just(TriageField::Question),
    ]
}

fn arb_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,-]{0,20}"
}

fn arb_state() -> impl Strategy<Value = TriageState> {
    proptest::collection::vec((arb_field(), arb_value()), 0..6)
        .prop_map(|pairs| pairs.into_iter().collect())
}

fn arb_complete_state() -> impl Strategy<Value = TriageState> {
    proptest::collection::vec("[a-zA-Z0-9]{1,12}", 5).prop_map(|values| {
        TriageField::ALL
            .into_iter()
            .zip(values)
            .collect::<TriageState>()
    })
}

/// Replies of every shape the model has been seen to produce
fn arb_reply() -> impl Strategy<Value = String> {
    prop_oneof![
        // arbitrary text
        ".{0,80}",
        // JSON object with field and non-field keys
        proptest::collection::btree_map("[a-z_]{1,10}", arb_value(), 0..6)
            .prop_map(|m| json!(m).to_string()),
        // JSON embedded in prose
        (arb_field(), arb_value())
            .prop_map(|(f, v)| format!("Sure: {} thanks", json!({ f.as_str(): v }))),
        // colon lines
        proptest::collection::vec((arb_field(), arb_value()), 0..4).prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(f, v)| format!("{f}: {v}"))
                .collect::<Vec<_>>()
                .join("\n")
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Never panics, and the outcome agrees with the completion predicate
    #[test]
    fn prop_outcome_matches_completeness(current in arb_state(), reply in arb_reply()) {
        let outcome = reduce(&current, &reply);
        prop_assert_eq!(outcome.is_done(), outcome.meta().is_complete());
        prop_assert_eq!(outcome.follow_up_question().is_none(), outcome.is_done());
    }

    // Complete is terminal
    #[test]
    fn prop_complete_stays_complete(current in arb_complete_state(), reply in arb_reply()) {
        let outcome = reduce(&current, &reply);
        prop_assert!(outcome.is_done());
        prop_assert!(reduce(outcome.meta(), &reply).is_done());
    }

    // Set fields never become unset
    #[test]
    fn prop_set_fields_stay_set(current in arb_state(), reply in arb_reply()) {
        let outcome = reduce(&current, &reply);
        for field in TriageField::ALL {
            if current.is_set(field) {
                prop_assert!(outcome.meta().is_set(field), "{} was erased", field);
            }
        }
    }

    // Same inputs, same result
    #[test]
    fn prop_reduce_is_deterministic(current in arb_state(), reply in arb_reply()) {
        prop_assert_eq!(reduce(&current, &reply), reduce(&current, &reply));
    }

    // Serialized meta only ever carries field-set keys
    #[test]
    fn prop_meta_keys_closed(current in arb_state(), reply in arb_reply()) {
        let meta = reduce(&current, &reply).into_meta().to_json();
        let obj = meta.as_object().unwrap();
        for key in obj.keys() {
            prop_assert!(TriageField::from_key(key).is_some(), "unexpected key {}", key);
        }
    }

    // Without any extraction the template names the first missing field
    #[test]
    fn prop_unparseable_reply_names_first_missing(
        current in arb_state(),
        reply in "[a-zA-Z ?.!]{0,60}",
    ) {
        let outcome = reduce(&current, &reply);
        if let Some(first) = current.missing_fields().first() {
            let expected = ask_for(*first);
            prop_assert_eq!(outcome.follow_up_question(), Some(expected.as_str()));
            prop_assert_eq!(outcome.meta(), &current);
        }
    }
}
