//! Property tests for key handling, cleanup partitioning and aggregation
//!
//! - build/validate round-trip for every valid component
//! - resolve passes unknown keys through and is idempotent
//! - partition conserves responses and removes exactly the legacy subset
//! - aggregation conserves responses and puts each one in its resolved bucket

use emx_common::cleanup::partition_legacy;
use emx_common::{
    aggregate, build_key, parse_key, validate_key, LegacyKeyResolver, ModuleResponse, ParticipantResponseDocument,
    ResponseValue,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn step_id() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9-]{1,12}"
}

fn step_type() -> impl Strategy<Value = String> {
    // Compound types are allowed; segments are lowercase words so none looks like `q{digits}`
    prop::collection::vec("[a-pr-z][a-z]{0,8}", 1..4).prop_map(|segments| segments.join("_"))
}

/// Mix of canonical keys, known aliases and malformed strings
fn any_question_key() -> impl Strategy<Value = String> {
    prop_oneof![
        (step_id(), step_type(), prop::option::of(0u32..20))
            .prop_map(|(id, ty, idx)| build_key(&id, &ty, idx).unwrap()),
        prop::sample::select(vec![
            "welcome",
            "demographic",
            "demographics-form",
            "SmartVOC",
            "smartvoc_csat",
            "cognitive",
            "thankyou",
            "demographics",
        ])
        .prop_map(|s| s.to_string()),
        "[a-zA-Z_-]{0,10}",
    ]
}

fn documents() -> impl Strategy<Value = Vec<ParticipantResponseDocument>> {
    prop::collection::vec(
        prop::collection::vec((any_question_key(), -10i64..10), 0..6),
        0..6,
    )
    .prop_map(|docs| {
        docs.into_iter()
            .enumerate()
            .map(|(i, answers)| {
                let mut doc = ParticipantResponseDocument::new("research-1", format!("p{}", i));
                for (key, value) in answers {
                    doc.responses.push(ModuleResponse::new(key, "", ResponseValue::from(value)));
                }
                doc
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_build_validate_round_trip(id in step_id(), ty in step_type(), idx in prop::option::of(0u32..1000)) {
        let key = build_key(&id, &ty, idx).unwrap();
        prop_assert!(validate_key(&key, &id, &ty));

        let parts = parse_key(&key).unwrap();
        prop_assert_eq!(parts.step_id, id);
        prop_assert_eq!(parts.step_type, ty);
        prop_assert_eq!(parts.question_index, idx);
    }

    #[test]
    fn prop_resolve_is_idempotent(raw in any_question_key()) {
        let resolver = LegacyKeyResolver::builtin();
        let once = resolver.resolve(&raw).to_string();
        prop_assert_eq!(resolver.resolve(&once), once.as_str());
        if !resolver.is_legacy(&raw) {
            prop_assert_eq!(once, raw);
        }
    }

    #[test]
    fn prop_partition_conserves_responses(docs in documents()) {
        let legacy: HashSet<String> = LegacyKeyResolver::builtin().purge_keys();
        for doc in docs {
            let before = doc.responses.clone();
            let (kept, removed) = partition_legacy(doc.responses, &legacy);

            prop_assert_eq!(before.len(), kept.len() + removed.len());
            prop_assert!(removed.iter().all(|r| legacy.contains(&r.question_key)));
            prop_assert!(kept.iter().all(|r| !legacy.contains(&r.question_key)));

            let expected_removed: Vec<&ModuleResponse> =
                before.iter().filter(|r| legacy.contains(&r.question_key)).collect();
            prop_assert_eq!(removed.iter().collect::<Vec<_>>(), expected_removed);
        }
    }

    #[test]
    fn prop_aggregate_conserves_and_groups(docs in documents()) {
        let resolver = LegacyKeyResolver::builtin();
        let grouped = aggregate(&docs, &resolver);

        let total_in: usize = docs.iter().map(|d| d.responses.len()).sum();
        let total_out: usize = grouped.values().map(|q| q.responses.len()).sum();
        prop_assert_eq!(total_in, total_out);

        for doc in &docs {
            for response in &doc.responses {
                let bucket = grouped.get(resolver.resolve(&response.question_key));
                prop_assert!(bucket.is_some());
                let found = bucket.unwrap().responses.iter().any(|entry| {
                    entry.participant_id == doc.participant_id && entry.value == response.value
                });
                prop_assert!(found);
            }
        }

        for (key, question) in &grouped {
            prop_assert_eq!(key, &question.question_key);
        }
    }
}
