// src/geometry/features.rs
//
// Fixed-length feature vector derived from RoadGeometry.
//
// Every entry is divided by a fixed constant from FeatureConfig and clamped to
// [0, 1], so vectors from suites with different road lengths stay comparable.
// Nothing here depends on the pool: extracting the same geometry twice gives a
// bit-identical vector.
//
// Strategy usage:
//   heuristic  → COMPLEXITY (score), full vector (diversity bookkeeping)
//   learned    → full vector as model input, COMPLEXITY as its own term
//   sequence   → SequenceFeatures for the model and pattern library,
//                full vector for diversity

use super::road_model::RoadGeometry;
use serde::{Deserialize, Serialize};

pub const FEATURE_DIM: usize = 8;

pub const MEAN_CURVATURE: usize = 0;
pub const MAX_CURVATURE: usize = 1;
pub const CURVATURE_STD: usize = 2;
pub const TURN_DENSITY: usize = 3;
pub const SHARP_TURN_RATIO: usize = 4;
pub const TOTAL_LENGTH: usize = 5;
pub const DIRECT_DISTANCE: usize = 6;
pub const COMPLEXITY: usize = 7;

pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "mean_curvature",
    "max_curvature",
    "curvature_std",
    "turn_density",
    "sharp_turn_ratio",
    "total_length",
    "direct_distance",
    "complexity",
];

/// Channels per segment in SequenceFeatures: length, sin, cos, curvature.
pub const SEQUENCE_CHANNELS: usize = 4;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// |κ| (1/m) that maps to 1.0.
    pub curvature_scale: f64,
    /// Road length (m) that maps to 1.0.
    pub length_scale: f64,
    /// Segment length (m) that maps to 1.0 in sequence features.
    pub segment_length_scale: f64,
    /// |θ| (rad) at which a vertex counts as a turn.
    pub turn_angle_threshold: f64,
    /// |θ| (rad) at which a turn counts as sharp.
    pub sharp_turn_threshold: f64,
    /// Turn density is measured per this many meters.
    pub density_length: f64,
    /// Sharp turns per `density_length` that maps to 1.0.
    pub max_turn_density: f64,
    pub complexity_turn_weight: f64,
    pub complexity_variance_weight: f64,
    pub complexity_divisor: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            curvature_scale: 0.2,
            length_scale: 500.0,
            segment_length_scale: 25.0,
            turn_angle_threshold: 0.05,
            sharp_turn_threshold: 0.3,
            density_length: 100.0,
            max_turn_density: 10.0,
            complexity_turn_weight: 1.0,
            complexity_variance_weight: 4.0,
            complexity_divisor: 20.0,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), String> {
        let positives = [
            ("curvature_scale", self.curvature_scale),
            ("length_scale", self.length_scale),
            ("segment_length_scale", self.segment_length_scale),
            ("density_length", self.density_length),
            ("max_turn_density", self.max_turn_density),
            ("complexity_divisor", self.complexity_divisor),
        ];
        for (name, value) in positives {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("features.{} must be > 0, got {}", name, value));
            }
        }
        if !(self.turn_angle_threshold >= 0.0 && self.turn_angle_threshold <= self.sharp_turn_threshold)
        {
            return Err(format!(
                "features.turn_angle_threshold ({}) must be in [0, sharp_turn_threshold ({})]",
                self.turn_angle_threshold, self.sharp_turn_threshold
            ));
        }
        for (name, weight) in [
            ("complexity_turn_weight", self.complexity_turn_weight),
            ("complexity_variance_weight", self.complexity_variance_weight),
        ] {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(format!("features.{} must be >= 0, got {}", name, weight));
            }
        }
        Ok(())
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_DIM]);

impl FeatureVector {
    pub fn zeros() -> Self {
        Self([0.0; FEATURE_DIM])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn complexity(&self) -> f64 {
        self.0[COMPLEXITY]
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.0.iter().map(|v| *v as f32).collect()
    }
}

/// Per-segment arrays for strategies that treat the road as a sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceFeatures {
    pub lengths: Vec<f64>,
    pub sin_headings: Vec<f64>,
    pub cos_headings: Vec<f64>,
    /// Signed curvature / curvature_scale, clamped to [-1, 1]. The first
    /// segment has no starting vertex and gets 0.
    pub curvatures: Vec<f64>,
}

impl SequenceFeatures {
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Row `i` as `[length, sin, cos, curvature]`.
    pub fn step(&self, i: usize) -> [f64; SEQUENCE_CHANNELS] {
        [
            self.lengths[i],
            self.sin_headings[i],
            self.cos_headings[i],
            self.curvatures[i],
        ]
    }

    /// Row-major `[len × SEQUENCE_CHANNELS]` buffer for model input.
    pub fn flatten_f32(&self) -> Vec<f32> {
        (0..self.len())
            .flat_map(|i| self.step(i))
            .map(|v| v as f32)
            .collect()
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Derive the fixed-length feature vector. Pure and deterministic.
pub fn extract(geometry: &RoadGeometry, config: &FeatureConfig) -> FeatureVector {
    let curvatures = &geometry.curvatures;
    let n = curvatures.len();

    let (mean_abs, max_abs, variance) = if n == 0 {
        (0.0, 0.0, 0.0)
    } else {
        let mean_abs = curvatures.iter().map(|k| k.abs()).sum::<f64>() / n as f64;
        let max_abs = curvatures.iter().map(|k| k.abs()).fold(0.0, f64::max);
        let mean = curvatures.iter().sum::<f64>() / n as f64;
        let variance = curvatures.iter().map(|k| (k - mean).powi(2)).sum::<f64>() / n as f64;
        (mean_abs, max_abs, variance)
    };

    let turns = geometry
        .turning_angles
        .iter()
        .filter(|a| a.abs() >= config.turn_angle_threshold)
        .count();
    let sharp_turns = geometry
        .turning_angles
        .iter()
        .filter(|a| a.abs() >= config.sharp_turn_threshold)
        .count();

    let turn_density = if geometry.total_length > 0.0 {
        sharp_turns as f64 * config.density_length / geometry.total_length
    } else {
        0.0
    };
    let sharp_ratio = if turns > 0 {
        sharp_turns as f64 / turns as f64
    } else {
        0.0
    };

    let scale = config.curvature_scale;
    let complexity = (config.complexity_turn_weight * turns as f64
        + config.complexity_variance_weight * variance / (scale * scale))
        / config.complexity_divisor;

    FeatureVector([
        unit(mean_abs / scale),
        unit(max_abs / scale),
        unit(variance.sqrt() / scale),
        unit(turn_density / config.max_turn_density),
        unit(sharp_ratio),
        unit(geometry.total_length / config.length_scale),
        unit(geometry.direct_distance / config.length_scale),
        unit(complexity),
    ])
}

/// Derive the per-segment arrays for sequence-aware strategies.
pub fn extract_sequence(geometry: &RoadGeometry, config: &FeatureConfig) -> SequenceFeatures {
    let count = geometry.segment_count();
    let mut seq = SequenceFeatures {
        lengths: Vec::with_capacity(count),
        sin_headings: Vec::with_capacity(count),
        cos_headings: Vec::with_capacity(count),
        curvatures: Vec::with_capacity(count),
    };

    for i in 0..count {
        let heading = geometry.headings[i];
        let kappa = if i == 0 {
            0.0
        } else {
            geometry.curvatures[i - 1]
        };
        seq.lengths
            .push(unit(geometry.segment_lengths[i] / config.segment_length_scale));
        seq.sin_headings.push(heading.sin());
        seq.cos_headings.push(heading.cos());
        seq.curvatures
            .push((kappa / config.curvature_scale).clamp(-1.0, 1.0));
    }

    seq
}

fn unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::road_model::{analyze, GeometryConfig};
    use crate::types::RoadPoint;

    fn geometry(xy: &[(f64, f64)]) -> RoadGeometry {
        let points: Vec<RoadPoint> = xy.iter().copied().map(RoadPoint::from).collect();
        analyze("t", &points, &GeometryConfig::default()).unwrap()
    }

    fn zigzag(n: usize, amplitude: f64) -> RoadGeometry {
        let xy: Vec<(f64, f64)> = (0..n)
            .map(|i| {
                let y = if i % 2 == 0 { 0.0 } else { amplitude };
                (i as f64 * 10.0, y)
            })
            .collect();
        geometry(&xy)
    }

    #[test]
    fn test_straight_road_features() {
        let g = geometry(&[(0.0, 0.0), (100.0, 0.0), (200.0, 0.0), (250.0, 0.0)]);
        let f = extract(&g, &FeatureConfig::default());
        assert_eq!(f.0[MEAN_CURVATURE], 0.0);
        assert_eq!(f.0[MAX_CURVATURE], 0.0);
        assert_eq!(f.0[TURN_DENSITY], 0.0);
        assert_eq!(f.0[SHARP_TURN_RATIO], 0.0);
        assert_eq!(f.complexity(), 0.0);
        assert!((f.0[TOTAL_LENGTH] - 0.5).abs() < 1e-12);
        assert!((f.0[DIRECT_DISTANCE] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_curved_road_is_more_complex() {
        let straight = geometry(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (30.0, 0.0)]);
        let curved = zigzag(12, 8.0);
        let cfg = FeatureConfig::default();
        let fs = extract(&straight, &cfg);
        let fc = extract(&curved, &cfg);
        assert!(fc.complexity() > fs.complexity());
        assert!(fc.0[MEAN_CURVATURE] > 0.0);
        assert!(fc.0[SHARP_TURN_RATIO] > 0.99);
        assert!(fc.0[DIRECT_DISTANCE] < fc.0[TOTAL_LENGTH]);
    }

    #[test]
    fn test_all_features_bounded() {
        let g = zigzag(60, 40.0);
        let f = extract(&g, &FeatureConfig::default());
        for (name, v) in FEATURE_NAMES.iter().zip(f.as_slice()) {
            assert!((0.0..=1.0).contains(v), "{} out of range: {}", name, v);
        }
    }

    #[test]
    fn test_extract_is_deterministic() {
        let g = zigzag(25, 6.5);
        let cfg = FeatureConfig::default();
        let a = extract(&g, &cfg);
        let b = extract(&g, &cfg);
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_scale_invariance_of_shape_ratios() {
        // Same shape at 2× size keeps the dimensionless ratios.
        let small = zigzag(10, 5.0);
        let big_xy: Vec<(f64, f64)> = (0..10)
            .map(|i| (i as f64 * 20.0, if i % 2 == 0 { 0.0 } else { 10.0 }))
            .collect();
        let big = geometry(&big_xy);
        let cfg = FeatureConfig::default();
        let fs = extract(&small, &cfg);
        let fb = extract(&big, &cfg);
        assert_eq!(fs.0[SHARP_TURN_RATIO], fb.0[SHARP_TURN_RATIO]);
        assert!((fb.0[TOTAL_LENGTH] - 2.0 * fs.0[TOTAL_LENGTH]).abs() < 1e-12);
    }

    #[test]
    fn test_two_point_road_has_no_vertex_stats() {
        let g = geometry(&[(0.0, 0.0), (3.0, 4.0)]);
        let f = extract(&g, &FeatureConfig::default());
        assert_eq!(f.0[CURVATURE_STD], 0.0);
        assert!((f.0[TOTAL_LENGTH] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_sequence_features_shape() {
        let g = geometry(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let seq = extract_sequence(&g, &FeatureConfig::default());
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.curvatures[0], 0.0);
        // 90° over 10 m = 0.157 1/m → 0.785 of scale
        assert!((seq.curvatures[1] - (std::f64::consts::FRAC_PI_2 / 10.0) / 0.2).abs() < 1e-12);
        assert!((seq.sin_headings[1] - 1.0).abs() < 1e-12);
        assert!((seq.lengths[0] - 0.4).abs() < 1e-12);
        assert_eq!(seq.flatten_f32().len(), 3 * SEQUENCE_CHANNELS);
    }

    #[test]
    fn test_config_validation() {
        assert!(FeatureConfig::default().validate().is_ok());
        let bad = FeatureConfig {
            length_scale: 0.0,
            ..FeatureConfig::default()
        };
        assert!(bad.validate().unwrap_err().contains("length_scale"));
        let inverted = FeatureConfig {
            turn_angle_threshold: 1.0,
            sharp_turn_threshold: 0.5,
            ..FeatureConfig::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_non_finite_complexity_weights_rejected() {
        for weight in [f64::NAN, f64::INFINITY, -0.1] {
            let turn = FeatureConfig {
                complexity_turn_weight: weight,
                ..FeatureConfig::default()
            };
            assert!(turn.validate().unwrap_err().contains("complexity_turn_weight"));
            let variance = FeatureConfig {
                complexity_variance_weight: weight,
                ..FeatureConfig::default()
            };
            assert!(variance
                .validate()
                .unwrap_err()
                .contains("complexity_variance_weight"));
        }
    }
}
