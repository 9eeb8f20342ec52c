//! Round-trip, classification and replay properties of the delta layer

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use vellum_core::{Element, ElementId, ElementMap, ErrorPolicy, ObservedAppState, ReplicaId, ShapeKind};
use vellum_delta::{ChangeSet, Diffable, ElementsDelta};
use vellum_test::{FuzzerConfig, Replica, SceneFuzzer};

/// Every id of `expected` must exist in `actual` with identical content
fn assert_content_matches(actual: &ElementMap, expected: &ElementMap) {
    for (id, element) in expected {
        let counterpart = actual
            .get(id)
            .unwrap_or_else(|| panic!("{id} missing from scene"));
        assert!(
            !Element::differs(counterpart, element),
            "{id} diverged: {counterpart:?} vs {element:?}"
        );
    }
}

#[test]
fn test_noop_calculate_is_empty() {
    let mut fuzzer = SceneFuzzer::new(FuzzerConfig::light());
    let scene = fuzzer.seed_scene();

    assert!(ElementsDelta::calculate(&scene, &scene.clone()).is_empty());
}

#[test]
fn test_round_trip_across_fuzzed_chain() {
    let mut fuzzer = SceneFuzzer::new(FuzzerConfig::light());
    let start = fuzzer.seed_scene();
    let scenes = fuzzer.mutation_chain(start);

    for window in scenes.windows(2) {
        let (prev, next) = (&window[0], &window[1]);
        let delta = ElementsDelta::calculate(prev, next);

        let (forward, _) = delta
            .apply_to(prev, &ElementMap::new(), ErrorPolicy::strict())
            .unwrap();
        assert_content_matches(&forward, next);

        let (back, _) = delta
            .inverse()
            .apply_to(&forward, &ElementMap::new(), ErrorPolicy::strict())
            .unwrap();
        assert_content_matches(&back, prev);
    }
}

#[test]
fn test_classification_invariant_across_fuzzed_chain() {
    let mut fuzzer = SceneFuzzer::new(FuzzerConfig::light().with_seed(7));
    let start = fuzzer.seed_scene();
    let scenes = fuzzer.mutation_chain(start);

    for window in scenes.windows(2) {
        let delta = ElementsDelta::calculate(&window[0], &window[1]);
        delta.validate().expect("classification invariant");

        // Every id in exactly one map
        let mut seen = BTreeSet::new();
        for id in delta.ids() {
            assert!(seen.insert(*id), "{id} appears in more than one map");
        }
    }
}

#[test]
fn test_undo_all_then_redo_all() {
    let mut fuzzer = SceneFuzzer::new(FuzzerConfig::light().with_seed(3));
    let mut replica = Replica::new(ReplicaId::new(1));
    replica.seed(fuzzer.seed_scene());

    let initial = replica.elements.clone();
    for _ in 0..fuzzer.config().op_count {
        let next = fuzzer.mutate(&replica.elements);
        replica.commit(next, ObservedAppState::new());
    }
    let last = replica.elements.clone();

    while replica.undo().is_some() {}
    assert_content_matches(&replica.elements, &initial);

    while replica.redo().is_some() {}
    assert_content_matches(&replica.elements, &last);
}

#[test]
fn test_undo_keeps_unrelated_drift() {
    let mut replica = Replica::new(ReplicaId::new(1));
    let element = Element::new(ElementId::new(1), ShapeKind::Rectangle).with_position(0.0, 0.0);
    replica.seed([(element.id, Arc::new(element.clone()))].into_iter().collect());

    // Commit a move, then drift an unrelated field outside history
    let moved = element.clone().with_position(40.0, 0.0).committed(1);
    replica.commit_element(moved.clone());

    let drifted = moved.with_stroke_color("#e03131").committed(2);
    replica.elements.insert(drifted.id, Arc::new(drifted));
    replica.snapshot = replica.elements.clone();

    replica.undo().unwrap();
    let undone = &replica.elements[&ElementId::new(1)];
    assert_eq!(undone.x, 0.0);
    // The drifted field was not part of the delta and survives
    assert_eq!(undone.stroke_color, "#e03131");

    replica.redo().unwrap();
    let redone = &replica.elements[&ElementId::new(1)];
    assert_eq!(redone.x, 40.0);
    assert_eq!(redone.stroke_color, "#e03131");
}

#[test]
fn test_lenient_fallback_preserves_scene() {
    let element = Element::new(ElementId::new(1), ShapeKind::Rectangle);
    let prev: ElementMap = [(element.id, Arc::new(element.clone()))].into_iter().collect();
    let next: ElementMap = [(
        element.id,
        Arc::new(element.with_position(5.0, 5.0).committed(1)),
    )]
    .into_iter()
    .collect();
    let delta = ElementsDelta::calculate(&prev, &next);

    // A scene that knows nothing about the delta's target
    let unrelated: ElementMap = [(
        ElementId::new(9),
        Arc::new(Element::new(ElementId::new(9), ShapeKind::Ellipse)),
    )]
    .into_iter()
    .collect();

    let (fallback, flags) = delta
        .apply_to(&unrelated, &ElementMap::new(), ErrorPolicy::lenient())
        .unwrap();
    assert_eq!(fallback, unrelated);
    assert!(flags.contains_visible_difference);
}

/// Committed mutations always regenerate the nonce, so two scenes never
/// share a nonce for an id unless the element is untouched; the parity
/// split models that.
fn arb_scene(nonce_parity: u64) -> impl Strategy<Value = ElementMap> {
    prop::collection::btree_map(
        1u64..8,
        (any::<u64>(), -100.0f64..100.0, any::<bool>()),
        0..6,
    )
    .prop_map(move |entries| {
        entries
            .into_iter()
            .map(|(id, (nonce, x, is_deleted))| {
                let mut element = Element::new(ElementId::new(id), ShapeKind::Rectangle)
                    .with_position(x, 0.0)
                    .with_version_nonce((nonce << 1) | nonce_parity);
                if is_deleted {
                    element = element.deleted();
                }
                (element.id, Arc::new(element))
            })
            .collect()
    })
}

proptest! {
    /// calculate(A, B) applied to A reproduces B's content on every
    /// shared id, and its inverse applied to the result reproduces A
    #[test]
    fn prop_round_trip(a in arb_scene(0), b in arb_scene(1)) {
        let delta = ElementsDelta::calculate(&a, &b);
        prop_assert!(delta.validate().is_ok());

        let (forward, _) = delta
            .apply_to(&a, &ElementMap::new(), ErrorPolicy::strict())
            .unwrap();
        for (id, element) in &b {
            // Ids absent from A that arrive already deleted are dropped
            // from the delta entirely
            if !a.contains_key(id) && element.is_deleted {
                continue;
            }
            let counterpart = &forward[id];
            prop_assert!(!Element::differs(counterpart, element));
        }

        let (back, _) = delta
            .inverse()
            .apply_to(&forward, &ElementMap::new(), ErrorPolicy::strict())
            .unwrap();
        for (id, element) in &a {
            if !b.contains_key(id) && element.is_deleted {
                continue;
            }
            prop_assert!(!Element::differs(&back[id], element));
        }
    }
}
