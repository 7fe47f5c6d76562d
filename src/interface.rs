// src/interface.rs
//
// Request/response surface of the engine. Transport is the caller's problem;
// every type here is plain serde so it can ride JSON, gRPC-JSON or a file.
//
//   InitRequest   → SelectionService::initialize  (validate + load models)
//   SelectRequest → SelectionService::select      → SelectResponse
//
// Failures come back as ErrorResponse { kind, test_id, message }.

use crate::config::EngineConfig;
use crate::error::{ErrorKind, SelectionError};
use crate::pipeline::RunSummary;
use crate::scoring::{InjectedModels, SelectionScore, StrategyKind};
use crate::selection::{Diagnostic, SelectionOutcome, SelectionPolicy, Selector};
use crate::types::TestCase;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// MESSAGES
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitRequest {
    #[serde(default)]
    pub config: EngineConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectRequest {
    pub tests: Vec<TestCase>,
}

/// Score of one valid test. Selected tests carry their pick-time score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub id: String,
    pub selected: bool,
    pub rank: Option<usize>,
    pub score: SelectionScore,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectResponse {
    pub strategy: StrategyKind,
    pub policy: SelectionPolicy,
    pub selected_ids: Vec<String>,
    /// Selected tests in pick order, then the rest in input order.
    pub scores: Vec<ScoreReport>,
    pub diagnostics: Vec<Diagnostic>,
    pub metrics: RunSummary,
}

impl From<SelectionOutcome> for SelectResponse {
    fn from(outcome: SelectionOutcome) -> Self {
        let selected_ids = outcome.selected.iter().map(|s| s.id.clone()).collect();
        let picked = outcome.selected.into_iter().map(|s| ScoreReport {
            id: s.id,
            selected: true,
            rank: Some(s.rank),
            score: s.score,
        });
        let rest = outcome.not_selected.into_iter().map(|s| ScoreReport {
            id: s.id,
            selected: false,
            rank: None,
            score: s.score,
        });
        Self {
            strategy: outcome.strategy,
            policy: outcome.policy,
            selected_ids,
            scores: picked.chain(rest).collect(),
            diagnostics: outcome.diagnostics,
            metrics: outcome.metrics,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub test_id: Option<String>,
    pub message: String,
}

impl From<&SelectionError> for ErrorResponse {
    fn from(err: &SelectionError) -> Self {
        Self {
            kind: err.kind(),
            test_id: err.test_id().map(str::to_string),
            message: err.to_string(),
        }
    }
}

impl From<SelectionError> for ErrorResponse {
    fn from(err: SelectionError) -> Self {
        Self::from(&err)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorResponse {}

// ============================================================================
// SERVICE
// ============================================================================

/// Holds at most one initialized selector. Re-initializing replaces it.
#[derive(Default)]
pub struct SelectionService {
    selector: Option<Selector>,
    injected: InjectedModels,
}

impl SelectionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use these models instead of the artifacts named in the config.
    pub fn with_models(injected: InjectedModels) -> Self {
        Self {
            selector: None,
            injected,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.selector.is_some()
    }

    pub fn initialize(&mut self, request: InitRequest) -> Result<(), ErrorResponse> {
        match Selector::from_config(&request.config, self.injected.clone()) {
            Ok(selector) => {
                info!("✓ Selection service initialized");
                self.selector = Some(selector);
                Ok(())
            }
            Err(err) => {
                warn!("⚠️  Initialization failed: {}", err);
                Err(err.into())
            }
        }
    }

    pub fn select(&self, request: &SelectRequest) -> Result<SelectResponse, ErrorResponse> {
        let selector = self.selector.as_ref().ok_or_else(|| {
            ErrorResponse::from(SelectionError::InvalidConfig(
                "select called before initialize".to_string(),
            ))
        })?;
        selector
            .select(&request.tests)
            .map(SelectResponse::from)
            .map_err(|err| {
                warn!("⚠️  Selection failed: {}", err);
                ErrorResponse::from(err)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::FeatureVector;
    use crate::inference::{FailureModel, ModelSource};
    use crate::scoring::patterns::KnownFailure;
    use crate::scoring::{LearnedConfig, SequenceConfig, StrategyConfig};
    use crate::selection::SelectorConfig;
    use crate::types::RoadPoint;
    use std::sync::Arc;

    struct ByComplexity;

    impl FailureModel for ByComplexity {
        fn name(&self) -> &str {
            "by-complexity"
        }
        fn predict(&self, features: &FeatureVector) -> crate::error::Result<f64> {
            Ok(features.complexity())
        }
    }

    /// NaN for straight roads, a valid probability for anything that turns.
    struct NanOnStraight;

    impl FailureModel for NanOnStraight {
        fn name(&self) -> &str {
            "nan-on-straight"
        }
        fn predict(&self, features: &FeatureVector) -> crate::error::Result<f64> {
            if features.complexity() > 0.0 {
                Ok(0.1)
            } else {
                Ok(f64::NAN)
            }
        }
    }

    fn pool() -> Vec<TestCase> {
        vec![
            TestCase::from_xy("straight", &[(0.0, 0.0), (60.0, 0.0), (120.0, 0.0)]),
            TestCase::from_xy(
                "wiggle",
                &[(0.0, 0.0), (10.0, 6.0), (20.0, 0.0), (30.0, 6.0), (40.0, 0.0)],
            ),
            TestCase::from_xy("dot", &[(3.0, 3.0)]),
        ]
    }

    fn top(k: usize) -> InitRequest {
        InitRequest {
            config: EngineConfig {
                selector: SelectorConfig {
                    max_selections: Some(k),
                    ..SelectorConfig::default()
                },
                ..EngineConfig::default()
            },
        }
    }

    #[test]
    fn test_select_before_initialize_is_config_error() {
        let service = SelectionService::new();
        let err = service.select(&SelectRequest { tests: pool() }).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidConfig);
        assert!(err.test_id.is_none());
    }

    #[test]
    fn test_response_lists_selected_then_rest() {
        let mut service = SelectionService::new();
        service.initialize(top(1)).unwrap();
        assert!(service.is_initialized());

        let response = service.select(&SelectRequest { tests: pool() }).unwrap();
        assert_eq!(response.selected_ids, vec!["wiggle".to_string()]);
        assert_eq!(response.scores.len(), 2);
        assert!(response.scores[0].selected);
        assert_eq!(response.scores[0].rank, Some(1));
        assert!(!response.scores[1].selected);
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].test_id, "dot");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["strategy"], "heuristic");
        assert_eq!(json["policy"], "top_k");
        assert_eq!(json["diagnostics"][0]["kind"], "INVALID_GEOMETRY");
    }

    #[test]
    fn test_strict_failure_carries_test_id() {
        let mut service = SelectionService::new();
        let mut request = top(1);
        request.config.selector.strict = true;
        service.initialize(request).unwrap();

        let err = service.select(&SelectRequest { tests: pool() }).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidGeometry);
        assert_eq!(err.test_id.as_deref(), Some("dot"));
        assert!(err.to_string().starts_with("[INVALID_GEOMETRY]"));
    }

    #[test]
    fn test_learned_strategy_without_model_fails_init() {
        let mut service = SelectionService::new();
        let request = InitRequest {
            config: EngineConfig {
                strategy: StrategyConfig::Learned(LearnedConfig::default()),
                ..EngineConfig::default()
            },
        };
        let err = service.initialize(request).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidConfig);
        assert!(!service.is_initialized());
    }

    #[test]
    fn test_injected_model_drives_learned_strategy() {
        let mut service = SelectionService::with_models(InjectedModels {
            failure: Some(Arc::new(ByComplexity)),
            sequence: None,
        });
        let mut request = top(1);
        request.config.strategy = StrategyConfig::Learned(LearnedConfig::default());
        service.initialize(request).unwrap();

        let response = service.select(&SelectRequest { tests: pool() }).unwrap();
        assert_eq!(response.strategy, StrategyKind::Learned);
        assert_eq!(response.selected_ids, vec!["wiggle".to_string()]);
        assert!(response.scores[0].score.failure_probability.unwrap() > 0.0);
    }

    #[test]
    fn test_nan_probability_fails_the_run() {
        let mut service = SelectionService::with_models(InjectedModels {
            failure: Some(Arc::new(NanOnStraight)),
            sequence: None,
        });
        let mut request = top(1);
        request.config.strategy = StrategyConfig::Learned(LearnedConfig::default());
        service.initialize(request).unwrap();

        let err = service.select(&SelectRequest { tests: pool() }).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ModelUnavailable);
        assert!(err.message.contains("NaN"));
    }

    fn hairpin(dx: f64, dy: f64) -> Vec<(f64, f64)> {
        [
            (0.0, 0.0),
            (10.0, 0.0),
            (12.0, 6.0),
            (30.0, 8.0),
            (60.0, 8.0),
            (90.0, 8.0),
        ]
        .iter()
        .map(|(x, y)| (x + dx, y + dy))
        .collect()
    }

    #[test]
    fn test_sequence_strategy_prefers_known_failure_shape() {
        let known = KnownFailure {
            id: "hairpin-042".to_string(),
            points: hairpin(0.0, 0.0).into_iter().map(RoadPoint::from).collect(),
        };
        let mut request = top(1);
        request.config.strategy = StrategyConfig::Sequence(SequenceConfig {
            model: Some(ModelSource::Inline {
                weights: vec![0.0; 4],
                bias: 0.0,
            }),
            known_failures: vec![known],
            ..SequenceConfig::default()
        });
        let mut service = SelectionService::new();
        service.initialize(request).unwrap();

        let tests = vec![
            TestCase::from_xy(
                "flat",
                &[(0.0, 0.0), (20.0, 0.0), (40.0, 0.0), (60.0, 0.0), (90.0, 0.0)],
            ),
            TestCase::from_xy("lookalike", &hairpin(200.0, -50.0)),
        ];
        let response = service.select(&SelectRequest { tests }).unwrap();

        assert_eq!(response.strategy, StrategyKind::Sequence);
        assert_eq!(response.selected_ids, vec!["lookalike".to_string()]);
        let picked = &response.scores[0].score;
        let left = &response.scores[1].score;
        assert_eq!(picked.failure_probability, Some(0.5));
        assert!(picked.pattern_similarity.unwrap() > 0.99);
        assert_eq!(left.pattern_similarity, Some(0.0));
        assert!(picked.total > left.total);

        let json = serde_json::to_value(&response).unwrap();
        assert!(json["scores"][0]["score"]["pattern_similarity"].as_f64().unwrap() > 0.99);
    }

    #[test]
    fn test_request_parses_from_json() {
        let body = r#"{
            "tests": [
                { "id": "r1", "points": [{"x": 0, "y": 0}, {"x": 3, "y": 4}], "group": "urban" },
                { "id": "r2", "points": [{"x": 0, "y": 0}, {"x": 1, "y": 1}],
                  "history": { "passes": 4, "failures": 1, "runs_since_selected": 2 } }
            ]
        }"#;
        let request: SelectRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.tests.len(), 2);
        assert_eq!(request.tests[0].group.as_deref(), Some("urban"));
        assert_eq!(request.tests[1].history.map(|h| h.failures), Some(1));
    }
}
