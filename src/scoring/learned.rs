// src/scoring/learned.rs
//
// Learned-probabilistic strategy:
//
//   score = w_f·p(fail | features) + w_d·novelty + w_c·complexity
//
// p comes from an injected FailureModel and is computed for the whole pool
// in one batch before the sequential pass. Novelty is the only term that
// depends on the run state.

use super::{
    check_unit_interval, Candidate, Precomputed, Scorer, SelectionScore, StrategyKind,
};
use crate::error::{Result, SelectionError};
use crate::inference::{checked_probability, FailureModel, ModelSource};
use crate::selection::{DiversityTracker, SelectionState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnedWeights {
    pub failure: f64,
    pub diversity: f64,
    pub complexity: f64,
}

impl Default for LearnedWeights {
    fn default() -> Self {
        Self {
            failure: 0.5,
            diversity: 0.3,
            complexity: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnedConfig {
    pub model: Option<ModelSource>,
    pub weights: LearnedWeights,
}

impl LearnedConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        let w = &self.weights;
        check_unit_interval("learned.weights.failure", w.failure)?;
        check_unit_interval("learned.weights.diversity", w.diversity)?;
        check_unit_interval("learned.weights.complexity", w.complexity)?;
        let sum = w.failure + w.diversity + w.complexity;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(format!("learned.weights must sum to 1, got {:.6}", sum));
        }
        Ok(())
    }
}

pub struct LearnedScorer {
    config: LearnedConfig,
    model: Arc<dyn FailureModel>,
}

impl LearnedScorer {
    pub fn new(config: LearnedConfig, model: Arc<dyn FailureModel>) -> Self {
        Self { config, model }
    }
}

impl Scorer for LearnedScorer {
    fn strategy(&self) -> StrategyKind {
        StrategyKind::Learned
    }

    fn precompute(&self, candidates: &[Candidate<'_>]) -> Result<Vec<Precomputed>> {
        let batch: Vec<_> = candidates.iter().map(|c| c.features).collect();
        let probabilities = self.model.predict_batch(&batch)?;
        if probabilities.len() != candidates.len() {
            return Err(SelectionError::ModelUnavailable(format!(
                "model '{}' returned {} probabilities for {} candidates",
                self.model.name(),
                probabilities.len(),
                candidates.len()
            )));
        }
        debug!(
            "Precomputed {} failure probabilities with '{}'",
            probabilities.len(),
            self.model.name()
        );
        probabilities
            .into_iter()
            .map(|p| {
                Ok(Precomputed {
                    failure_probability: Some(checked_probability(self.model.name(), p)?),
                    pattern_similarity: None,
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
        let w = &self.config.weights;
        let p = precomputed.failure_probability.unwrap_or(0.0);
        let novelty = tracker.novelty(&candidate.features, state);
        let complexity = candidate.features.complexity();

        SelectionScore {
            total: w.failure * p + w.diversity * novelty + w.complexity * complexity,
            failure_probability: Some(p),
            diversity: novelty,
            complexity,
            group_factor: 1.0,
            history_factor: 1.0,
            recency_factor: 1.0,
            pattern_similarity: None,
        }
    }
}
