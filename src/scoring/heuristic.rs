// src/scoring/heuristic.rs
//
// Model-free strategy. Complexity stands in for failure likelihood; the other
// three factors are multiplicative penalties in (0, 1]:
//
//   score = max(complexity, floor) × history × group × recency
//
// A test never selected recently, from an under-represented group, with a
// failing track record scores highest. The floor keeps perfectly straight
// roads above zero so the group penalty still orders them.

use super::{
    check_floor, group_factor, history_factor, recency_factor, Candidate, Precomputed, Scorer,
    SelectionScore, StrategyKind,
};
use crate::selection::{DiversityTracker, SelectionState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    pub complexity_floor: f64,
    pub history_floor: f64,
    /// Each already-selected group member divides the score by (1 + penalty).
    pub group_penalty: f64,
    /// Runs after selection during which the recency penalty applies.
    /// 0 disables it.
    pub recency_window: u32,
    pub recency_floor: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            complexity_floor: 0.05,
            history_floor: 0.5,
            group_penalty: 1.0,
            recency_window: 3,
            recency_floor: 0.25,
        }
    }
}

impl HeuristicConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_floor("heuristic.complexity_floor", self.complexity_floor)?;
        check_floor("heuristic.history_floor", self.history_floor)?;
        check_floor("heuristic.recency_floor", self.recency_floor)?;
        if !(self.group_penalty.is_finite() && self.group_penalty >= 0.0) {
            return Err(format!(
                "heuristic.group_penalty must be >= 0, got {}",
                self.group_penalty
            ));
        }
        Ok(())
    }
}

pub struct HeuristicScorer {
    config: HeuristicConfig,
}

impl HeuristicScorer {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }
}

impl Scorer for HeuristicScorer {
    fn strategy(&self) -> StrategyKind {
        StrategyKind::Heuristic
    }

    fn score(
        &self,
        candidate: &Candidate<'_>,
        _precomputed: &Precomputed,
        tracker: &DiversityTracker,
        state: &SelectionState,
    ) -> SelectionScore {
        let complexity = candidate.features.complexity();
        let history = history_factor(candidate.test, self.config.history_floor);
        let group = group_factor(candidate.group(), state, self.config.group_penalty);
        let recency = recency_factor(
            candidate.test,
            self.config.recency_window,
            self.config.recency_floor,
        );

        SelectionScore {
            total: complexity.max(self.config.complexity_floor) * history * group * recency,
            failure_probability: None,
            // Reported for auditing only.
            diversity: tracker.novelty(&candidate.features, state),
            complexity,
            group_factor: group,
            history_factor: history,
            recency_factor: recency,
            pattern_similarity: None,
        }
    }
}
