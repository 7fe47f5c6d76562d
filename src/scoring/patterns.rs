// src/scoring/patterns.rs
//
// Known-failure pattern matching for the sequence strategy.
//
// A road's curvature profile is |κ| sampled at every interior vertex,
// positioned by normalized arc length s ∈ [0, 1], then linearly resampled to
// a fixed number of points. Fixed length makes roads with different point
// counts comparable; normalized arc length makes the shape, not the size,
// matter. Absolute curvature makes mirrored roads (left vs right bends) match.

use crate::error::{Result, SelectionError};
use crate::geometry::{analyze, FeatureConfig, GeometryConfig, RoadGeometry};
use crate::selection::diversity::cosine_similarity;
use crate::types::RoadPoint;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A road that failed in simulation, supplied through configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownFailure {
    pub id: String,
    pub points: Vec<RoadPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurvatureProfile(Vec<f64>);

impl CurvatureProfile {
    pub fn from_geometry(geometry: &RoadGeometry, config: &FeatureConfig, samples: usize) -> Self {
        let samples = samples.max(2);
        let total = geometry.total_length;
        if geometry.curvatures.is_empty() || total <= 0.0 {
            return Self(vec![0.0; samples]);
        }

        // Vertex j sits at the end of segment j.
        let knots: Vec<(f64, f64)> = geometry
            .curvatures
            .iter()
            .enumerate()
            .map(|(j, k)| {
                let s = geometry.cumulative_lengths[j + 1] / total;
                let v = (k.abs() / config.curvature_scale).clamp(0.0, 1.0);
                (s, v)
            })
            .collect();

        let values = (0..samples)
            .map(|i| interpolate(&knots, i as f64 / (samples - 1) as f64))
            .collect();
        Self(values)
    }

    /// Cosine similarity in [0, 1].
    pub fn similarity(&self, other: &CurvatureProfile) -> f64 {
        cosine_similarity(&self.0, &other.0)
    }
}

/// Piecewise-linear through `knots` (sorted by s), flat beyond the ends.
fn interpolate(knots: &[(f64, f64)], s: f64) -> f64 {
    let first = knots[0];
    let last = knots[knots.len() - 1];
    if s <= first.0 {
        return first.1;
    }
    if s >= last.0 {
        return last.1;
    }
    for pair in knots.windows(2) {
        let ((s0, v0), (s1, v1)) = (pair[0], pair[1]);
        if s >= s0 && s <= s1 {
            let span = s1 - s0;
            if span <= f64::EPSILON {
                return v1;
            }
            return v0 + (v1 - v0) * (s - s0) / span;
        }
    }
    last.1
}

#[derive(Debug, Clone, Default)]
pub struct FailurePatternLibrary {
    patterns: Vec<(String, CurvatureProfile)>,
}

impl FailurePatternLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configured roads. A malformed road is a config error.
    pub fn from_roads(
        roads: &[KnownFailure],
        samples: usize,
        geometry: &GeometryConfig,
        features: &FeatureConfig,
    ) -> Result<Self> {
        let mut library = Self::new();
        for road in roads {
            let g = analyze(&road.id, &road.points, geometry).map_err(|e| {
                SelectionError::InvalidConfig(format!("known failure pattern rejected: {}", e))
            })?;
            library.insert(&road.id, CurvatureProfile::from_geometry(&g, features, samples));
        }
        if !library.is_empty() {
            info!("✓ Failure pattern library: {} known failures", library.len());
        }
        Ok(library)
    }

    pub fn insert(&mut self, id: &str, profile: CurvatureProfile) {
        self.patterns.push((id.to_string(), profile));
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.patterns.iter().any(|(known, _)| known == id)
    }

    /// Highest similarity to any known failure; 0 for an empty library.
    pub fn best_match(&self, profile: &CurvatureProfile) -> f64 {
        self.patterns
            .iter()
            .map(|(_, known)| known.similarity(profile))
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(xy: &[(f64, f64)]) -> RoadGeometry {
        let points: Vec<RoadPoint> = xy.iter().copied().map(RoadPoint::from).collect();
        analyze("g", &points, &GeometryConfig::default()).unwrap()
    }

    fn hairpin_at_start() -> Vec<(f64, f64)> {
        vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (12.0, 6.0),
            (30.0, 8.0),
            (60.0, 8.0),
            (90.0, 8.0),
            (120.0, 8.0),
        ]
    }

    fn known(id: &str, xy: &[(f64, f64)]) -> KnownFailure {
        KnownFailure {
            id: id.to_string(),
            points: xy.iter().copied().map(RoadPoint::from).collect(),
        }
    }

    #[test]
    fn test_profile_has_fixed_length() {
        let cfg = FeatureConfig::default();
        let short = CurvatureProfile::from_geometry(&geometry(&[(0.0, 0.0), (1.0, 0.0)]), &cfg, 16);
        let long = CurvatureProfile::from_geometry(&geometry(&hairpin_at_start()), &cfg, 16);
        assert_eq!(short.0.len(), 16);
        assert_eq!(long.0.len(), 16);
        assert!(short.0.iter().all(|v| *v == 0.0));
        assert!(long.0.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_mirrored_road_matches() {
        let cfg = FeatureConfig::default();
        let original = hairpin_at_start();
        let mirrored: Vec<(f64, f64)> = original.iter().map(|(x, y)| (*x, -*y)).collect();
        let a = CurvatureProfile::from_geometry(&geometry(&original), &cfg, 32);
        let b = CurvatureProfile::from_geometry(&geometry(&mirrored), &cfg, 32);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_library_best_match() {
        let cfg = FeatureConfig::default();
        let library = FailurePatternLibrary::from_roads(
            &[known("hairpin", &hairpin_at_start())],
            32,
            &GeometryConfig::default(),
            &cfg,
        )
        .unwrap();
        assert_eq!(library.len(), 1);
        assert!(library.contains("hairpin"));

        let same = CurvatureProfile::from_geometry(&geometry(&hairpin_at_start()), &cfg, 32);
        let flat = CurvatureProfile::from_geometry(
            &geometry(&[(0.0, 0.0), (50.0, 0.0), (100.0, 0.0)]),
            &cfg,
            32,
        );
        assert!(library.best_match(&same) > 0.99);
        assert_eq!(library.best_match(&flat), 0.0);
        assert_eq!(FailurePatternLibrary::new().best_match(&same), 0.0);
    }

    #[test]
    fn test_malformed_known_failure_is_config_error() {
        let err = FailurePatternLibrary::from_roads(
            &[known("bad", &[(0.0, 0.0)])],
            32,
            &GeometryConfig::default(),
            &FeatureConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SelectionError::InvalidConfig(_)));
    }

    #[test]
    fn test_interpolate_midpoint() {
        let knots = [(0.25, 0.0), (0.75, 1.0)];
        assert_eq!(interpolate(&knots, 0.0), 0.0);
        assert!((interpolate(&knots, 0.5) - 0.5).abs() < 1e-12);
        assert_eq!(interpolate(&knots, 1.0), 1.0);
    }
}
