// src/selection/diversity.rs
//
// Novelty of a candidate against what the run has already selected.
//
//   novelty(x, S) = 1 - max_{s ∈ S} cos(x, s)      (S empty → 1)
//
// Feature vectors live in [0, 1]^d, so cosine similarity is already in
// [0, 1]; the clamp only absorbs rounding. Growing S can only raise the max,
// so novelty never increases as the run progresses.

use super::state::SelectionState;
use crate::geometry::FeatureVector;
use tracing::debug;

/// Norms below this count as the zero vector.
const ZERO_NORM: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default)]
pub struct DiversityTracker;

impl DiversityTracker {
    pub fn new() -> Self {
        Self
    }

    /// Novelty score in [0, 1]. 1 means nothing similar has been selected.
    pub fn novelty(&self, candidate: &FeatureVector, state: &SelectionState) -> f64 {
        let max_similarity = state
            .selected_features()
            .iter()
            .map(|selected| cosine_similarity(candidate.as_slice(), selected.as_slice()))
            .fold(0.0f64, f64::max);
        (1.0 - max_similarity).clamp(0.0, 1.0)
    }

    /// Record a newly selected test. Observing the same id twice in one run
    /// is a no-op and returns false.
    pub fn observe(
        &self,
        id: &str,
        features: &FeatureVector,
        group: Option<&str>,
        state: &mut SelectionState,
    ) -> bool {
        let added = state.record(id, *features, group);
        if added {
            debug!(
                "🧭 observed {} (group={}) → {} selected",
                id,
                group.unwrap_or("-"),
                state.len()
            );
        } else {
            debug!("🧭 {} already observed this run, ignoring", id);
        }
        added
    }
}

/// Cosine similarity clamped to [0, 1]. Two zero vectors are identical;
/// a zero vector is dissimilar to everything else.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let (na, nb) = (norm_a.sqrt(), norm_b.sqrt());
    match (na < ZERO_NORM, nb < ZERO_NORM) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => (dot / (na * nb)).clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fv(values: [f64; 8]) -> FeatureVector {
        FeatureVector(values)
    }

    #[test]
    fn test_empty_state_is_maximally_novel() {
        let tracker = DiversityTracker::new();
        let state = SelectionState::new();
        assert_eq!(
            tracker.novelty(&fv([0.3, 0.1, 0.0, 0.5, 1.0, 0.2, 0.2, 0.7]), &state),
            1.0
        );
        assert_eq!(tracker.novelty(&FeatureVector::zeros(), &state), 1.0);
    }

    #[test]
    fn test_observed_vector_has_zero_novelty() {
        let tracker = DiversityTracker::new();
        let mut state = SelectionState::new();
        let x = fv([0.3, 0.1, 0.0, 0.5, 1.0, 0.2, 0.2, 0.7]);
        tracker.observe("x", &x, None, &mut state);
        assert!(tracker.novelty(&x, &state) < 1e-9);

        // Near-duplicate is also nearly not novel.
        let near = fv([0.31, 0.1, 0.0, 0.5, 1.0, 0.2, 0.2, 0.7]);
        assert!(tracker.novelty(&near, &state) < 1e-3);
    }

    #[test]
    fn test_orthogonal_vector_stays_novel() {
        let tracker = DiversityTracker::new();
        let mut state = SelectionState::new();
        tracker.observe(
            "a",
            &fv([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            None,
            &mut state,
        );
        let other = fv([0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!((tracker.novelty(&other, &state) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_observe_same_id_twice_is_guarded() {
        let tracker = DiversityTracker::new();
        let mut state = SelectionState::new();
        let x = fv([0.5; 8]);
        assert!(tracker.observe("dup", &x, Some("g"), &mut state));
        assert!(!tracker.observe("dup", &x, Some("g"), &mut state));
        assert_eq!(state.len(), 1);
        assert_eq!(state.group_count(Some("g")), 1);
    }

    #[test]
    fn test_zero_vector_similarity_rules() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    proptest! {
        #[test]
        fn prop_novelty_is_monotone_non_increasing(
            candidate in prop::array::uniform8(0.0f64..1.0),
            selected in prop::collection::vec(prop::array::uniform8(0.0f64..1.0), 1..12),
        ) {
            let tracker = DiversityTracker::new();
            let mut state = SelectionState::new();
            let candidate = FeatureVector(candidate);
            let mut previous = tracker.novelty(&candidate, &state);
            prop_assert!((previous - 1.0).abs() < 1e-12);

            for (i, values) in selected.iter().enumerate() {
                tracker.observe(&format!("s{}", i), &FeatureVector(*values), None, &mut state);
                let now = tracker.novelty(&candidate, &state);
                prop_assert!((0.0..=1.0).contains(&now));
                prop_assert!(now <= previous + 1e-12);
                previous = now;
            }
        }
    }
}
