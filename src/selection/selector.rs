// src/selection/selector.rs
//
// Turns a pool of test cases into an ordered selection.
//
//   extract (parallel) → precompute (batch) → policy pass (sequential)
//
// The policy pass owns the run's SelectionState and calls `observe` after
// every pick, so each rescoring sees everything selected before it. Scores
// only drop as the state grows, which is what makes greedy top-k exact:
// nothing left behind can later beat a test that was picked ahead of it.
//
// Policies:
//   threshold    score against the empty state, keep score > τ, input order
//   top_k        greedy argmax against the live state until target
//   group_quota  greedy argmax restricted to labeled groups below quota,
//                then top-up from everyone until target

use super::diversity::DiversityTracker;
use super::state::SelectionState;
use crate::config::EngineConfig;
use crate::error::{ErrorKind, Result, SelectionError};
use crate::geometry::{FeatureConfig, GeometryConfig};
use crate::pipeline::{extract_pool, ExtractionReport, RunMetrics, RunSummary};
use crate::scoring::{
    build_scorer, Candidate, InjectedModels, Precomputed, Scorer, SelectionScore, StrategyKind,
};
use crate::types::TestCase;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    Threshold,
    TopK,
    GroupQuota,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::Threshold => "threshold",
            SelectionPolicy::TopK => "top_k",
            SelectionPolicy::GroupQuota => "group_quota",
        }
    }
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPoolPolicy {
    #[default]
    ReturnEmpty,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub policy: SelectionPolicy,
    pub min_selections: usize,
    /// Explicit size for top-k; hard cap for the quota pass.
    pub max_selections: Option<usize>,
    /// Per-group minimum for `group_quota`. Only labeled groups count.
    pub group_quota: Option<usize>,
    /// Fraction of the pool to select when `max_selections` is unset.
    pub selection_ratio: f64,
    /// Strict lower bound for the threshold policy.
    pub score_threshold: f64,
    /// Abort on the first malformed test instead of excluding it.
    pub strict: bool,
    pub empty_pool: EmptyPoolPolicy,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            policy: SelectionPolicy::TopK,
            min_selections: 0,
            max_selections: None,
            group_quota: None,
            selection_ratio: 0.2,
            score_threshold: 0.3,
            strict: false,
            empty_pool: EmptyPoolPolicy::ReturnEmpty,
        }
    }
}

impl SelectorConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(max) = self.max_selections {
            if self.min_selections > max {
                return Err(format!(
                    "selector.min_selections ({}) exceeds selector.max_selections ({})",
                    self.min_selections, max
                ));
            }
        }
        if !(self.selection_ratio.is_finite()
            && self.selection_ratio > 0.0
            && self.selection_ratio <= 1.0)
        {
            return Err(format!(
                "selector.selection_ratio must be in (0, 1], got {}",
                self.selection_ratio
            ));
        }
        if !self.score_threshold.is_finite() {
            return Err("selector.score_threshold must be finite".to_string());
        }
        match (self.policy, self.group_quota) {
            (_, Some(0)) => Err("selector.group_quota must be >= 1".to_string()),
            (SelectionPolicy::GroupQuota, None) => {
                Err("policy 'group_quota' requires selector.group_quota".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Selection size for a pool of `available` valid candidates.
    pub fn target(&self, available: usize) -> usize {
        let wanted = match self.max_selections {
            Some(max) => max,
            None => (available as f64 * self.selection_ratio).round() as usize,
        };
        wanted.max(self.min_selections).min(available)
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SelectedTest {
    pub id: String,
    /// Position in the input pool.
    pub index: usize,
    /// 1-based pick order.
    pub rank: usize,
    /// Score at the moment the test was picked.
    pub score: SelectionScore,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredTest {
    pub id: String,
    pub index: usize,
    pub score: SelectionScore,
}

/// A test excluded from the run, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub test_id: String,
    pub index: usize,
    pub kind: ErrorKind,
    pub message: String,
}

impl Diagnostic {
    fn from_error(test: &TestCase, index: usize, err: &SelectionError) -> Self {
        Self {
            test_id: err.test_id().unwrap_or(&test.id).to_string(),
            index,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionOutcome {
    pub strategy: StrategyKind,
    pub policy: SelectionPolicy,
    pub selected: Vec<SelectedTest>,
    /// Valid tests left out. Scored against the final state (the empty state
    /// for the threshold policy), in input order.
    pub not_selected: Vec<ScoredTest>,
    pub diagnostics: Vec<Diagnostic>,
    pub metrics: RunSummary,
}

impl SelectionOutcome {
    pub fn selected_ids(&self) -> Vec<&str> {
        self.selected.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected test cases from `pool`, in pick order.
    pub fn selected_tests<'a>(&self, pool: &'a [TestCase]) -> Vec<&'a TestCase> {
        self.selected
            .iter()
            .filter_map(|s| pool.get(s.index))
            .collect()
    }
}

// ============================================================================
// SELECTOR
// ============================================================================

pub struct Selector {
    config: SelectorConfig,
    scorer: Box<dyn Scorer>,
    tracker: DiversityTracker,
    geometry: GeometryConfig,
    features: FeatureConfig,
}

impl Selector {
    pub fn new(
        config: SelectorConfig,
        scorer: Box<dyn Scorer>,
        geometry: GeometryConfig,
        features: FeatureConfig,
    ) -> Result<Self> {
        config.validate().map_err(SelectionError::InvalidConfig)?;
        Ok(Self {
            config,
            scorer,
            tracker: DiversityTracker::new(),
            geometry,
            features,
        })
    }

    /// Validate the whole engine config, build the strategy (loading model
    /// artifacts unless `injected` supplies them) and wire the selector.
    pub fn from_config(config: &EngineConfig, injected: InjectedModels) -> Result<Self> {
        config.validate()?;
        let scorer = build_scorer(
            &config.strategy,
            injected,
            &config.inference,
            &config.geometry,
            &config.features,
        )?;
        info!(
            "✓ Selector ready: strategy={}, policy={}",
            scorer.strategy(),
            config.selector.policy
        );
        Self::new(
            config.selector.clone(),
            scorer,
            config.geometry.clone(),
            config.features.clone(),
        )
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn strategy(&self) -> StrategyKind {
        self.scorer.strategy()
    }

    /// Run one selection over `pool`. Every call starts from a fresh state.
    pub fn select(&self, pool: &[TestCase]) -> Result<SelectionOutcome> {
        let metrics = RunMetrics::new();
        metrics.set(&metrics.tests_received, pool.len() as u64);

        if pool.is_empty() {
            return match self.config.empty_pool {
                EmptyPoolPolicy::Reject => Err(SelectionError::EmptyPool),
                EmptyPoolPolicy::ReturnEmpty => {
                    info!("Empty candidate pool, nothing to select");
                    Ok(self.outcome(Vec::new(), Vec::new(), Vec::new(), &metrics))
                }
            };
        }

        let ExtractionReport {
            candidates,
            rejected,
        } = extract_pool(pool, &self.geometry, &self.features, &metrics);

        let diagnostics: Vec<Diagnostic> = if self.config.strict {
            if let Some((_, err)) = rejected.into_iter().next() {
                return Err(err);
            }
            Vec::new()
        } else {
            rejected
                .iter()
                .map(|(index, err)| Diagnostic::from_error(&pool[*index], *index, err))
                .collect()
        };

        let start = Instant::now();
        let precomputed = self.scorer.precompute(&candidates)?;
        if precomputed.len() != candidates.len() {
            return Err(SelectionError::ModelUnavailable(format!(
                "strategy '{}' produced {} precomputed entries for {} candidates",
                self.scorer.strategy(),
                precomputed.len(),
                candidates.len()
            )));
        }
        metrics.set_timing(&metrics.precompute_time_us, start.elapsed());

        let start = Instant::now();
        let mut run = Run::new(self, &candidates, &precomputed, &metrics);
        let target = self.config.target(candidates.len());
        let not_selected = match self.config.policy {
            SelectionPolicy::Threshold => self.apply_threshold(&mut run),
            SelectionPolicy::TopK => {
                run.fill_to(target);
                run.remaining_scores()
            }
            SelectionPolicy::GroupQuota => {
                self.apply_group_quota(&mut run, target);
                run.remaining_scores()
            }
        };
        let selected = run.into_selected();
        metrics.set_timing(&metrics.selection_time_us, start.elapsed());
        metrics.set(&metrics.tests_selected, selected.len() as u64);

        info!(
            "✓ Selected {}/{} tests (strategy={}, policy={}, target={}, excluded={})",
            selected.len(),
            pool.len(),
            self.scorer.strategy(),
            self.config.policy,
            target,
            diagnostics.len()
        );

        Ok(self.outcome(selected, not_selected, diagnostics, &metrics))
    }

    /// Every test is judged against the empty state, so its inclusion does
    /// not depend on what came before it in the pool.
    fn apply_threshold(&self, run: &mut Run<'_, '_>) -> Vec<ScoredTest> {
        let baseline = SelectionState::new();
        let scores: Vec<SelectionScore> = (0..run.candidates.len())
            .map(|i| run.score_against(i, &baseline))
            .collect();

        let mut not_selected = Vec::new();
        for (i, score) in scores.into_iter().enumerate() {
            if score.total > self.config.score_threshold {
                run.pick(i, score);
            } else {
                not_selected.push(run.scored(i, score));
            }
        }
        not_selected
    }

    fn apply_group_quota(&self, run: &mut Run<'_, '_>, target: usize) {
        let quota = self.config.group_quota.unwrap_or(1);
        let cap = self
            .config
            .max_selections
            .unwrap_or(usize::MAX)
            .min(run.candidates.len());

        while run.picks.len() < cap {
            let best = run.best_where(|c| {
                c.group()
                    .is_some_and(|g| run.state.group_count(Some(g)) < quota)
            });
            match best {
                Some((i, score)) => run.pick(i, score),
                None => break,
            }
        }
        debug!("Quota pass picked {} tests (quota={})", run.picks.len(), quota);

        run.fill_to(target);
    }

    fn outcome(
        &self,
        selected: Vec<SelectedTest>,
        not_selected: Vec<ScoredTest>,
        diagnostics: Vec<Diagnostic>,
        metrics: &RunMetrics,
    ) -> SelectionOutcome {
        SelectionOutcome {
            strategy: self.scorer.strategy(),
            policy: self.config.policy,
            selected,
            not_selected,
            diagnostics,
            metrics: metrics.summary(),
        }
    }
}

// ============================================================================
// RUN
// ============================================================================

/// Sequential pass over one pool. Owns the run's state.
struct Run<'r, 'a> {
    scorer: &'r dyn Scorer,
    tracker: DiversityTracker,
    candidates: &'r [Candidate<'a>],
    precomputed: &'r [Precomputed],
    metrics: &'r RunMetrics,
    state: SelectionState,
    /// (candidate position, pick-time score) in pick order.
    picks: Vec<(usize, SelectionScore)>,
}

impl<'r, 'a> Run<'r, 'a> {
    fn new(
        selector: &'r Selector,
        candidates: &'r [Candidate<'a>],
        precomputed: &'r [Precomputed],
        metrics: &'r RunMetrics,
    ) -> Self {
        Self {
            scorer: selector.scorer.as_ref(),
            tracker: selector.tracker,
            candidates,
            precomputed,
            metrics,
            state: SelectionState::new(),
            picks: Vec::new(),
        }
    }

    fn score_against(&self, i: usize, state: &SelectionState) -> SelectionScore {
        self.metrics.inc(&self.metrics.score_evaluations);
        self.scorer
            .score(&self.candidates[i], &self.precomputed[i], &self.tracker, state)
    }

    /// Highest-scoring untaken candidate accepted by `eligible`. Candidates
    /// are in input order and only a strictly greater score replaces the
    /// current best, so ties go to the earliest input.
    fn best_where<F>(&self, eligible: F) -> Option<(usize, SelectionScore)>
    where
        F: Fn(&Candidate<'a>) -> bool,
    {
        let mut best: Option<(usize, SelectionScore)> = None;
        for (i, candidate) in self.candidates.iter().enumerate() {
            if self.state.is_selected(candidate.id()) || !eligible(candidate) {
                continue;
            }
            let score = self.score_against(i, &self.state);
            match &best {
                Some((_, current)) if score.total.total_cmp(&current.total).is_le() => {}
                _ => best = Some((i, score)),
            }
        }
        best
    }

    fn pick(&mut self, i: usize, score: SelectionScore) {
        let candidates = self.candidates;
        let candidate = &candidates[i];
        self.tracker
            .observe(candidate.id(), &candidate.features, candidate.group(), &mut self.state);
        self.picks.push((i, score));
        debug!(
            "#{} {} (score={:.4}, input #{})",
            self.picks.len(),
            candidate.id(),
            score.total,
            candidate.index
        );
    }

    /// Greedy top-k against the live state until `target` picks.
    fn fill_to(&mut self, target: usize) {
        while self.picks.len() < target {
            match self.best_where(|_| true) {
                Some((i, score)) => self.pick(i, score),
                None => break,
            }
        }
    }

    fn scored(&self, i: usize, score: SelectionScore) -> ScoredTest {
        let candidate = &self.candidates[i];
        ScoredTest {
            id: candidate.id().to_string(),
            index: candidate.index,
            score,
        }
    }

    fn remaining_scores(&self) -> Vec<ScoredTest> {
        (0..self.candidates.len())
            .filter(|i| !self.state.is_selected(self.candidates[*i].id()))
            .map(|i| self.scored(i, self.score_against(i, &self.state)))
            .collect()
    }

    fn into_selected(self) -> Vec<SelectedTest> {
        debug!("Pick order: {}", self.state.selection_order().join(" → "));
        self.picks
            .into_iter()
            .enumerate()
            .map(|(rank, (i, score))| {
                let candidate = &self.candidates[i];
                SelectedTest {
                    id: candidate.id().to_string(),
                    index: candidate.index,
                    rank: rank + 1,
                    score,
                }
            })
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
