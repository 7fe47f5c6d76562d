// src/scoring/mod.rs
//
// Polymorphic scoring strategies.
//
//   heuristic  complexity × history × group × recency      (no model)
//   learned    w_f·p + w_d·novelty + w_c·complexity        (FailureModel)
//   sequence   w_f·p + (1-w_f)·(β·pattern + (1-β)·novelty) (SequenceModel)
//
// The selector only talks to `dyn Scorer`. Every strategy is non-decreasing
// in novelty and never reads anything the selector has not handed it, so a
// candidate's score can only drop as the run's state grows.

pub mod heuristic;
pub mod learned;
pub mod patterns;
pub mod sequence;

pub use heuristic::{HeuristicConfig, HeuristicScorer};
pub use learned::{LearnedConfig, LearnedScorer, LearnedWeights};
pub use patterns::{CurvatureProfile, FailurePatternLibrary};
pub use sequence::{SequenceConfig, SequenceScorer};

use crate::error::{Result, SelectionError};
use crate::geometry::{FeatureConfig, FeatureVector, GeometryConfig, RoadGeometry, SequenceFeatures};
use crate::inference::{
    load_failure_model, load_sequence_model, FailureModel, InferenceConfig, SequenceModel,
};
use crate::selection::{DiversityTracker, SelectionState};
use crate::types::TestCase;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

// ============================================================================
// TYPES
// ============================================================================

/// One pool entry after geometry analysis and feature extraction.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// Position in the input pool. Used for tie-breaking.
    pub index: usize,
    pub test: &'a TestCase,
    pub geometry: RoadGeometry,
    pub features: FeatureVector,
    pub sequence: SequenceFeatures,
}

impl Candidate<'_> {
    pub fn id(&self) -> &str {
        &self.test.id
    }

    pub fn group(&self) -> Option<&str> {
        self.test.group.as_deref()
    }
}

/// State-independent signals computed once per run, ahead of the
/// sequential pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Precomputed {
    pub failure_probability: Option<f64>,
    pub pattern_similarity: Option<f64>,
}

/// Scalar score plus the terms that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectionScore {
    pub total: f64,
    pub failure_probability: Option<f64>,
    pub diversity: f64,
    pub complexity: f64,
    pub group_factor: f64,
    pub history_factor: f64,
    pub recency_factor: f64,
    pub pattern_similarity: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Heuristic,
    Learned,
    Sequence,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Heuristic => "heuristic",
            StrategyKind::Learned => "learned",
            StrategyKind::Sequence => "sequence",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// CAPABILITY
// ============================================================================

pub trait Scorer: Send + Sync {
    fn strategy(&self) -> StrategyKind;

    /// Batch work that does not depend on the selection state (model
    /// inference, pattern matching). One entry per candidate, same order.
    fn precompute(&self, candidates: &[Candidate<'_>]) -> Result<Vec<Precomputed>> {
        Ok(vec![Precomputed::default(); candidates.len()])
    }

    /// Score a candidate against the current state. Must not mutate state.
    fn score(
        &self,
        candidate: &Candidate<'_>,
        precomputed: &Precomputed,
        tracker: &DiversityTracker,
        state: &SelectionState,
    ) -> SelectionScore;
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum StrategyConfig {
    Heuristic(HeuristicConfig),
    Learned(LearnedConfig),
    Sequence(SequenceConfig),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Heuristic(HeuristicConfig::default())
    }
}

impl StrategyConfig {
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyConfig::Heuristic(_) => StrategyKind::Heuristic,
            StrategyConfig::Learned(_) => StrategyKind::Learned,
            StrategyConfig::Sequence(_) => StrategyKind::Sequence,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            StrategyConfig::Heuristic(c) => c.validate(),
            StrategyConfig::Learned(c) => c.validate(),
            StrategyConfig::Sequence(c) => c.validate(),
        }
    }
}

/// Models handed in by the caller instead of loaded from an artifact.
#[derive(Clone, Default)]
pub struct InjectedModels {
    pub failure: Option<Arc<dyn FailureModel>>,
    pub sequence: Option<Arc<dyn SequenceModel>>,
}

/// Build the configured strategy, loading model artifacts as needed.
/// Injected models take precedence over configured artifacts.
pub fn build_scorer(
    strategy: &StrategyConfig,
    injected: InjectedModels,
    inference: &InferenceConfig,
    geometry: &GeometryConfig,
    features: &FeatureConfig,
) -> Result<Box<dyn Scorer>> {
    strategy.validate().map_err(SelectionError::InvalidConfig)?;

    let scorer: Box<dyn Scorer> = match strategy {
        StrategyConfig::Heuristic(config) => Box::new(HeuristicScorer::new(config.clone())),
        StrategyConfig::Learned(config) => {
            let model = match (injected.failure, &config.model) {
                (Some(model), _) => model,
                (None, Some(source)) => load_failure_model(source, inference)?,
                (None, None) => {
                    return Err(SelectionError::InvalidConfig(
                        "strategy 'learned' requires a model artifact".to_string(),
                    ))
                }
            };
            Box::new(LearnedScorer::new(config.clone(), model))
        }
        StrategyConfig::Sequence(config) => {
            let model = match (injected.sequence, &config.model) {
                (Some(model), _) => model,
                (None, Some(source)) => load_sequence_model(source, inference)?,
                (None, None) => {
                    return Err(SelectionError::InvalidConfig(
                        "strategy 'sequence' requires a model artifact".to_string(),
                    ))
                }
            };
            let library = FailurePatternLibrary::from_roads(
                &config.known_failures,
                config.resample_points,
                geometry,
                features,
            )?;
            Box::new(SequenceScorer::new(config.clone(), model, library, features.clone()))
        }
    };

    info!("✓ Scorer ready: strategy={}", scorer.strategy());
    Ok(scorer)
}

// ============================================================================
// SHARED TERMS
// ============================================================================

/// (0, 1]. Neutral without a usable record; otherwise rises with the
/// Laplace-smoothed historical failure rate.
pub fn history_factor(test: &TestCase, floor: f64) -> f64 {
    match test.history {
        Some(h) if h.total_runs() > 0 => {
            let rate = (h.failures as f64 + 1.0) / (h.total_runs() as f64 + 2.0);
            floor + (1.0 - floor) * rate
        }
        _ => 1.0,
    }
}

/// (0, 1]. Penalizes tests selected within the last `window` runs, linearly
/// relaxing back to 1.0 as runs elapse.
pub fn recency_factor(test: &TestCase, window: u32, floor: f64) -> f64 {
    match test.history.and_then(|h| h.runs_since_selected) {
        Some(runs) if runs < window => floor + (1.0 - floor) * runs as f64 / window as f64,
        _ => 1.0,
    }
}

/// (0, 1]. Shrinks as more of the candidate's group is already selected.
pub fn group_factor(group: Option<&str>, state: &SelectionState, penalty: f64) -> f64 {
    1.0 / (1.0 + penalty * state.group_count(group) as f64)
}

pub(crate) fn check_unit_interval(name: &str, value: f64) -> std::result::Result<(), String> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{} must be in [0, 1], got {}", name, value))
    }
}

pub(crate) fn check_floor(name: &str, value: f64) -> std::result::Result<(), String> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(format!("{} must be in (0, 1], got {}", name, value))
    }
}

// ============================================================================
// TESTS
// ============================================================================
