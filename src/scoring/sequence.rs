// src/scoring/sequence.rs
//
// Sequence-aware strategy. Treats the road as an ordered sequence of
// segments instead of a flat vector:
//
//   score = w_f·p + (1 - w_f)·(β·pattern + (1 - β)·novelty)
//
//   p        SequenceModel over per-segment [len, sin, cos, κ]
//   pattern  best curvature-profile match against known failures
//   novelty  flat-vector diversity against the run state
//
// The run's pattern library is the configured one plus every pool test whose
// history records a failure, so a test that failed before matches itself.

use super::patterns::{CurvatureProfile, FailurePatternLibrary, KnownFailure};
use super::{
    check_unit_interval, Candidate, Precomputed, Scorer, SelectionScore, StrategyKind,
};
use crate::error::Result;
use crate::geometry::FeatureConfig;
use crate::inference::{checked_probability, ModelSource, SequenceModel};
use crate::selection::{DiversityTracker, SelectionState};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub model: Option<ModelSource>,
    pub failure_weight: f64,
    /// β: share of the non-failure term given to pattern similarity.
    pub pattern_blend: f64,
    pub resample_points: usize,
    pub known_failures: Vec<KnownFailure>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            model: None,
            failure_weight: 0.5,
            pattern_blend: 0.5,
            resample_points: 32,
            known_failures: Vec::new(),
        }
    }
}

impl SequenceConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        check_unit_interval("sequence.failure_weight", self.failure_weight)?;
        check_unit_interval("sequence.pattern_blend", self.pattern_blend)?;
        if self.resample_points < 2 {
            return Err(format!(
                "sequence.resample_points must be >= 2, got {}",
                self.resample_points
            ));
        }
        Ok(())
    }
}

pub struct SequenceScorer {
    config: SequenceConfig,
    model: Arc<dyn SequenceModel>,
    library: FailurePatternLibrary,
    features: FeatureConfig,
}

impl SequenceScorer {
    pub fn new(
        config: SequenceConfig,
        model: Arc<dyn SequenceModel>,
        library: FailurePatternLibrary,
        features: FeatureConfig,
    ) -> Self {
        Self {
            config,
            model,
            library,
            features,
        }
    }

    fn profile(&self, candidate: &Candidate<'_>) -> CurvatureProfile {
        CurvatureProfile::from_geometry(
            &candidate.geometry,
            &self.features,
            self.config.resample_points,
        )
    }
}

impl Scorer for SequenceScorer {
    fn strategy(&self) -> StrategyKind {
        StrategyKind::Sequence
    }

    fn precompute(&self, candidates: &[Candidate<'_>]) -> Result<Vec<Precomputed>> {
        let profiles: Vec<CurvatureProfile> =
            candidates.par_iter().map(|c| self.profile(c)).collect();

        let mut library = self.library.clone();
        for (candidate, profile) in candidates.iter().zip(&profiles) {
            let failed = candidate.test.history.is_some_and(|h| h.has_failed());
            if failed && !library.contains(candidate.id()) {
                library.insert(candidate.id(), profile.clone());
            }
        }
        debug!(
            "Pattern library for this run: {} entries ({} configured)",
            library.len(),
            self.library.len()
        );

        candidates
            .par_iter()
            .zip(profiles.par_iter())
            .map(|(candidate, profile)| {
                let p = checked_probability(
                    self.model.name(),
                    self.model.predict_sequence(&candidate.sequence)?,
                )?;
                Ok(Precomputed {
                    failure_probability: Some(p),
                    pattern_similarity: Some(library.best_match(profile)),
                })
            })
            .collect()
    }

    fn score(
        &self,
        candidate: &Candidate<'_>,
        precomputed: &Precomputed,
        tracker: &DiversityTracker,
        state: &SelectionState,
    ) -> SelectionScore {
        let w_f = self.config.failure_weight;
        let beta = self.config.pattern_blend;
        let p = precomputed.failure_probability.unwrap_or(0.0);
        let pattern = precomputed.pattern_similarity.unwrap_or(0.0);
        let novelty = tracker.novelty(&candidate.features, state);

        SelectionScore {
            total: w_f * p + (1.0 - w_f) * (beta * pattern + (1.0 - beta) * novelty),
            failure_probability: Some(p),
            diversity: novelty,
            complexity: candidate.features.complexity(),
            group_factor: 1.0,
            history_factor: 1.0,
            recency_factor: 1.0,
            pattern_similarity: Some(pattern),
        }
    }
}
