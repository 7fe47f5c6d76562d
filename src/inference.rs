// src/inference.rs
//
// Opaque failure-probability models.
//
// The engine only sees `predict(features) -> prob`. Where the parameters come
// from is the model artifact store's business: a JSON logistic artifact on
// disk, inline weights in the config, an ONNX graph (behind the `onnx`
// feature), or any caller-provided implementation of the traits below.
//
// Dimensionality is checked once at load time so a mismatched artifact fails
// initialization with ModelUnavailable instead of producing garbage mid-run.

use crate::error::{Result, SelectionError};
use crate::geometry::{FeatureVector, SequenceFeatures, FEATURE_DIM, SEQUENCE_CHANNELS};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Flat-vector failure predictor.
pub trait FailureModel: Send + Sync {
    fn name(&self) -> &str;

    /// Probability in [0, 1] that the test fails in simulation.
    fn predict(&self, features: &FeatureVector) -> Result<f64>;

    /// One inference call for the whole pool. Override when the backend
    /// benefits from batching.
    fn predict_batch(&self, batch: &[FeatureVector]) -> Result<Vec<f64>> {
        batch.iter().map(|f| self.predict(f)).collect()
    }
}

/// Predictor over the per-segment road sequence.
pub trait SequenceModel: Send + Sync {
    fn name(&self) -> &str;

    fn predict_sequence(&self, sequence: &SequenceFeatures) -> Result<f64>;
}

/// Reject NaN and pull the rest into [0, 1].
pub fn checked_probability(model: &str, p: f64) -> Result<f64> {
    if p.is_nan() {
        return Err(SelectionError::ModelUnavailable(format!(
            "model '{}' produced NaN",
            model
        )));
    }
    Ok(p.clamp(0.0, 1.0))
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// ============================================================================
// ARTIFACT SOURCES
// ============================================================================

/// Where a learned strategy gets its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSource {
    /// JSON file holding a `LogisticArtifact`.
    Logistic { path: PathBuf },
    /// Logistic parameters embedded in the config.
    Inline { weights: Vec<f64>, bias: f64 },
    /// ONNX graph. Requires the `onnx` cargo feature.
    Onnx { path: PathBuf },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub num_threads: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self { num_threads: 1 }
    }
}

/// On-disk logistic model: `p = σ(w·x + b)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticArtifact {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticArtifact {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            SelectionError::ModelUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            SelectionError::ModelUnavailable(format!(
                "malformed logistic artifact {}: {}",
                path.display(),
                e
            ))
        })
    }

    fn check(&self, name: &str, expected_dim: usize) -> Result<()> {
        if self.weights.len() != expected_dim {
            return Err(SelectionError::ModelUnavailable(format!(
                "model '{}' expects {} inputs, engine provides {}",
                name,
                self.weights.len(),
                expected_dim
            )));
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(SelectionError::ModelUnavailable(format!(
                "model '{}' has non-finite parameters",
                name
            )));
        }
        Ok(())
    }
}

pub fn load_failure_model(
    source: &ModelSource,
    inference: &InferenceConfig,
) -> Result<Arc<dyn FailureModel>> {
    match source {
        ModelSource::Logistic { path } => {
            let artifact = LogisticArtifact::load(path)?;
            let name = path.display().to_string();
            Ok(Arc::new(LogisticModel::new(name, artifact)?))
        }
        ModelSource::Inline { weights, bias } => Ok(Arc::new(LogisticModel::new(
            "inline",
            LogisticArtifact {
                weights: weights.clone(),
                bias: *bias,
            },
        )?)),
        ModelSource::Onnx { path } => load_onnx_failure_model(path, inference),
    }
}

pub fn load_sequence_model(
    source: &ModelSource,
    inference: &InferenceConfig,
) -> Result<Arc<dyn SequenceModel>> {
    match source {
        ModelSource::Logistic { path } => {
            let artifact = LogisticArtifact::load(path)?;
            let name = path.display().to_string();
            Ok(Arc::new(PooledSequenceModel::new(name, artifact)?))
        }
        ModelSource::Inline { weights, bias } => Ok(Arc::new(PooledSequenceModel::new(
            "inline",
            LogisticArtifact {
                weights: weights.clone(),
                bias: *bias,
            },
        )?)),
        ModelSource::Onnx { path } => load_onnx_sequence_model(path, inference),
    }
}

// ============================================================================
// LOGISTIC (FLAT)
// ============================================================================

pub struct LogisticModel {
    name: String,
    weights: Array1<f64>,
    bias: f64,
}

impl LogisticModel {
    pub fn new(name: impl Into<String>, artifact: LogisticArtifact) -> Result<Self> {
        let name = name.into();
        artifact.check(&name, FEATURE_DIM)?;
        info!("✓ Logistic failure model '{}' loaded ({} inputs)", name, FEATURE_DIM);
        Ok(Self {
            name,
            weights: Array1::from(artifact.weights),
            bias: artifact.bias,
        })
    }
}

impl FailureModel for LogisticModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let x = Array1::from(features.as_slice().to_vec());
        checked_probability(&self.name, sigmoid(x.dot(&self.weights) + self.bias))
    }

    fn predict_batch(&self, batch: &[FeatureVector]) -> Result<Vec<f64>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let flat: Vec<f64> = batch.iter().flat_map(|f| f.0).collect();
        let x = Array2::from_shape_vec((batch.len(), FEATURE_DIM), flat).map_err(|e| {
            SelectionError::ModelUnavailable(format!("batch shape error in '{}': {}", self.name, e))
        })?;
        let logits = x.dot(&self.weights) + self.bias;
        debug!("Batched inference over {} candidates", batch.len());
        logits
            .iter()
            .map(|z| checked_probability(&self.name, sigmoid(*z)))
            .collect()
    }
}

// ============================================================================
// LOGISTIC (SEQUENCE, POOLED)
// ============================================================================

/// Logistic model over channel-wise mean-absolute pooling of the sequence:
/// `[mean|len|, mean|sin|, mean|cos|, mean|κ|]`.
pub struct PooledSequenceModel {
    name: String,
    weights: Array1<f64>,
    bias: f64,
}

impl PooledSequenceModel {
    pub fn new(name: impl Into<String>, artifact: LogisticArtifact) -> Result<Self> {
        let name = name.into();
        artifact.check(&name, SEQUENCE_CHANNELS)?;
        info!("✓ Pooled sequence model '{}' loaded", name);
        Ok(Self {
            name,
            weights: Array1::from(artifact.weights),
            bias: artifact.bias,
        })
    }

    fn pool(sequence: &SequenceFeatures) -> Array1<f64> {
        let n = sequence.len();
        if n == 0 {
            return Array1::zeros(SEQUENCE_CHANNELS);
        }
        let mut pooled = Array1::<f64>::zeros(SEQUENCE_CHANNELS);
        for i in 0..n {
            for (c, v) in sequence.step(i).iter().enumerate() {
                pooled[c] += v.abs();
            }
        }
        pooled / n as f64
    }
}

impl SequenceModel for PooledSequenceModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_sequence(&self, sequence: &SequenceFeatures) -> Result<f64> {
        let pooled = Self::pool(sequence);
        checked_probability(&self.name, sigmoid(pooled.dot(&self.weights) + self.bias))
    }
}

// ============================================================================
// ONNX
// ============================================================================

#[cfg(feature = "onnx")]
mod onnx {
    use super::*;
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Tensor;
    use std::sync::Mutex;

    fn unavailable(context: &str, e: impl std::fmt::Display) -> SelectionError {
        SelectionError::ModelUnavailable(format!("{}: {}", context, e))
    }

    fn build_session(path: &Path, inference: &InferenceConfig) -> Result<Session> {
        info!("Building ONNX Runtime session for {}", path.display());
        Session::builder()
            .map_err(|e| unavailable("session builder", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| unavailable("optimization level", e))?
            .with_intra_threads(inference.num_threads.max(1))
            .map_err(|e| unavailable("intra threads", e))?
            .with_inter_threads(1)
            .map_err(|e| unavailable("inter threads", e))?
            .commit_from_file(path)
            .map_err(|e| unavailable(&format!("failed to load {}", path.display()), e))
    }

    /// Runs `[rows, cols]` f32 input, returns the first output column.
    fn run(session: &Mutex<Session>, rows: usize, cols: usize, data: Vec<f32>) -> Result<Vec<f64>> {
        let input = Tensor::from_array(([rows, cols], data.into_boxed_slice()))
            .map_err(|e| unavailable("input tensor", e))?;
        let mut session = session
            .lock()
            .map_err(|_| SelectionError::ModelUnavailable("ONNX session poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| unavailable("inference failed", e))?;
        let (_shape, values) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| unavailable("output tensor", e))?;
        if values.len() < rows {
            return Err(SelectionError::ModelUnavailable(format!(
                "model returned {} values for {} rows",
                values.len(),
                rows
            )));
        }
        let stride = values.len() / rows;
        Ok((0..rows).map(|r| values[r * stride] as f64).collect())
    }

    pub struct OnnxFailureModel {
        name: String,
        session: Mutex<Session>,
    }

    impl OnnxFailureModel {
        pub fn load(path: &Path, inference: &InferenceConfig) -> Result<Self> {
            let session = build_session(path, inference)?;
            info!("✓ ONNX failure model ready: {}", path.display());
            Ok(Self {
                name: path.display().to_string(),
                session: Mutex::new(session),
            })
        }
    }

    impl FailureModel for OnnxFailureModel {
        fn name(&self) -> &str {
            &self.name
        }

        fn predict(&self, features: &FeatureVector) -> Result<f64> {
            let probs = run(&self.session, 1, FEATURE_DIM, features.to_f32())?;
            checked_probability(&self.name, probs[0])
        }

        fn predict_batch(&self, batch: &[FeatureVector]) -> Result<Vec<f64>> {
            if batch.is_empty() {
                return Ok(Vec::new());
            }
            let data: Vec<f32> = batch.iter().flat_map(|f| f.to_f32()).collect();
            run(&self.session, batch.len(), FEATURE_DIM, data)?
                .into_iter()
                .map(|p| checked_probability(&self.name, p))
                .collect()
        }
    }

    /// Sequence model taking `[1, T, SEQUENCE_CHANNELS]`.
    pub struct OnnxSequenceModel {
        name: String,
        session: Mutex<Session>,
    }

    impl OnnxSequenceModel {
        pub fn load(path: &Path, inference: &InferenceConfig) -> Result<Self> {
            let session = build_session(path, inference)?;
            info!("✓ ONNX sequence model ready: {}", path.display());
            Ok(Self {
                name: path.display().to_string(),
                session: Mutex::new(session),
            })
        }
    }

    impl SequenceModel for OnnxSequenceModel {
        fn name(&self) -> &str {
            &self.name
        }

        fn predict_sequence(&self, sequence: &SequenceFeatures) -> Result<f64> {
            let steps = sequence.len().max(1);
            let mut data = sequence.flatten_f32();
            data.resize(steps * SEQUENCE_CHANNELS, 0.0);
            let input = Tensor::from_array(([1, steps, SEQUENCE_CHANNELS], data.into_boxed_slice()))
                .map_err(|e| unavailable("input tensor", e))?;
            let mut session = self.session.lock().map_err(|_| {
                SelectionError::ModelUnavailable("ONNX session poisoned".to_string())
            })?;
            let outputs = session
                .run(ort::inputs![input])
                .map_err(|e| unavailable("inference failed", e))?;
            let (_shape, values) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| unavailable("output tensor", e))?;
            let p = values.first().copied().ok_or_else(|| {
                SelectionError::ModelUnavailable(format!("model '{}' returned no output", self.name))
            })?;
            checked_probability(&self.name, p as f64)
        }
    }
}

#[cfg(feature = "onnx")]
pub use onnx::{OnnxFailureModel, OnnxSequenceModel};

#[cfg(feature = "onnx")]
fn load_onnx_failure_model(
    path: &Path,
    inference: &InferenceConfig,
) -> Result<Arc<dyn FailureModel>> {
    Ok(Arc::new(OnnxFailureModel::load(path, inference)?))
}

#[cfg(feature = "onnx")]
fn load_onnx_sequence_model(
    path: &Path,
    inference: &InferenceConfig,
) -> Result<Arc<dyn SequenceModel>> {
    Ok(Arc::new(OnnxSequenceModel::load(path, inference)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx_failure_model(
    path: &Path,
    _inference: &InferenceConfig,
) -> Result<Arc<dyn FailureModel>> {
    Err(onnx_disabled(path))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx_sequence_model(
    path: &Path,
    _inference: &InferenceConfig,
) -> Result<Arc<dyn SequenceModel>> {
    Err(onnx_disabled(path))
}

#[cfg(not(feature = "onnx"))]
fn onnx_disabled(path: &Path) -> SelectionError {
    SelectionError::ModelUnavailable(format!(
        "{} is an ONNX artifact but this build has no `onnx` feature",
        path.display()
    ))
}

// ============================================================================
// TESTS
// ============================================================================
