//! Property-based tests for lane-token decomposition and resolution.
//!
//! These use proptest to verify the naming invariants across many generated
//! module names, catching edge cases hand-written tests would miss.

use proptest::prelude::*;

use testlane::catalog::naming::{
    Category, compose_lane_id, compose_wrapper_stem, decompose_wrapper_stem,
    flat_token_candidates,
};

fn any_category() -> impl Strategy<Value = Category> {
    prop::sample::select(Category::ALL.to_vec())
}

/// Module names as they appear on disk: lowercase alphanumeric with inner
/// underscores, never starting with an underscore or digit.
fn any_module() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_filter("no trailing underscore", |s| !s.ends_with('_'))
}

proptest! {
    /// Round-trip: composing a flat lane id and decomposing it again yields
    /// the original (category, module) pair, uniquely.
    #[test]
    fn flat_lane_id_round_trips(category in any_category(), module in any_module()) {
        let id = compose_lane_id(category, Some(&module));
        let candidates = flat_token_candidates(&id);
        prop_assert_eq!(candidates, vec![(category, Some(module))]);
    }

    /// Bare category tokens decompose to the category with no module.
    #[test]
    fn bare_category_round_trips(category in any_category()) {
        let id = compose_lane_id(category, None);
        let candidates = flat_token_candidates(&id);
        prop_assert_eq!(candidates, vec![(category, None)]);
    }

    /// Wrapper stems decompose back to the pair that composed them.
    #[test]
    fn wrapper_stem_round_trips(category in any_category(), module in any_module()) {
        let stem = compose_wrapper_stem(category, Some(&module));
        let name = decompose_wrapper_stem(&stem).expect("composed stem must decompose");
        prop_assert_eq!(name.category, category);
        prop_assert_eq!(name.module, Some(module));
    }

    /// Decomposition never panics on arbitrary tokens and every candidate it
    /// returns re-composes to the original token.
    #[test]
    fn candidates_are_sound(token in "[a-z0-9_-]{0,24}") {
        for (category, module) in flat_token_candidates(&token) {
            prop_assert_eq!(compose_lane_id(category, module.as_deref()), token.clone());
        }
    }
}
