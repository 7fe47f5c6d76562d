// src/config.rs
//
// Engine configuration, loaded from YAML. Every section has defaults, so a
// config file only needs the keys it changes:
//
//   strategy:
//     name: learned
//     model: { kind: logistic, path: models/failure.json }
//   selector:
//     policy: top_k
//     max_selections: 50

use crate::error::{Result, SelectionError};
use crate::geometry::{FeatureConfig, GeometryConfig};
use crate::inference::InferenceConfig;
use crate::scoring::{HeuristicConfig, StrategyConfig};
use crate::selection::{SelectionPolicy, SelectorConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub geometry: GeometryConfig,
    pub features: FeatureConfig,
    pub strategy: StrategyConfig,
    pub selector: SelectorConfig,
    pub inference: InferenceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` wins when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "sdc_test_selector=info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            SelectionError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: EngineConfig = serde_yaml::from_str(&contents).map_err(|e| {
            SelectionError::InvalidConfig(format!("malformed config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let min_len = self.geometry.min_segment_length;
        if !(min_len.is_finite() && min_len > 0.0) {
            return Err(SelectionError::InvalidConfig(format!(
                "geometry.min_segment_length must be > 0, got {}",
                min_len
            )));
        }
        if self.inference.num_threads == 0 {
            return Err(SelectionError::InvalidConfig(
                "inference.num_threads must be >= 1".to_string(),
            ));
        }
        self.features
            .validate()
            .and_then(|_| self.strategy.validate())
            .and_then(|_| self.selector.validate())
            .map_err(SelectionError::InvalidConfig)
    }

    // ========================================================================
    // PRESETS
    // ========================================================================

    /// Quick pre-merge run: the 10% most interesting roads, model-free.
    pub fn smoke_suite() -> Self {
        Self {
            strategy: StrategyConfig::Heuristic(HeuristicConfig::default()),
            selector: SelectorConfig {
                policy: SelectionPolicy::TopK,
                selection_ratio: 0.1,
                min_selections: 1,
                ..SelectorConfig::default()
            },
            ..Self::default()
        }
    }

    /// Nightly run that guarantees `quota` tests from every labeled
    /// scenario group before filling by score.
    pub fn balanced_groups(quota: usize) -> Self {
        Self {
            strategy: StrategyConfig::Heuristic(HeuristicConfig {
                group_penalty: 2.0,
                ..HeuristicConfig::default()
            }),
            selector: SelectorConfig {
                policy: SelectionPolicy::GroupQuota,
                group_quota: Some(quota),
                selection_ratio: 0.3,
                ..SelectorConfig::default()
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ModelSource;
    use std::io::Write;

    fn write_config(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let file = write_config(
            "strategy:\n  name: learned\n  model:\n    kind: inline\n    weights: [0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1]\n    bias: -1.0\nselector:\n  policy: top_k\n  max_selections: 5\n",
        );
        let config = EngineConfig::load(file.path()).unwrap();

        match &config.strategy {
            StrategyConfig::Learned(learned) => {
                assert!(matches!(learned.model, Some(ModelSource::Inline { .. })));
                assert_eq!(learned.weights.failure, 0.5);
            }
            other => panic!("expected learned strategy, got {:?}", other.kind()),
        }
        assert_eq!(config.selector.max_selections, Some(5));
        assert_eq!(config.selector.selection_ratio, 0.2);
        assert_eq!(config.logging.level, "sdc_test_selector=info");
    }

    #[test]
    fn test_contradictory_bounds_rejected_on_load() {
        let file = write_config("selector:\n  min_selections: 9\n  max_selections: 3\n");
        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, SelectionError::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = EngineConfig::load("/nonexistent/sdc-select.yaml").unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::smoke_suite().validate().is_ok());
        let balanced = EngineConfig::balanced_groups(2);
        assert!(balanced.validate().is_ok());
        assert_eq!(balanced.selector.group_quota, Some(2));
        assert!(EngineConfig::balanced_groups(0).validate().is_err());
    }

    #[test]
    fn test_yaml_roundtrip_of_default() {
        let yaml = serde_yaml::to_string(&EngineConfig::default()).unwrap();
        let parsed: EngineConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.strategy.kind(), EngineConfig::default().strategy.kind());
    }
}
