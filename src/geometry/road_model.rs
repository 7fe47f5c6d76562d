// src/geometry/road_model.rs
//
// Canonical geometric view of a road centerline.
//
// Input is an ordered polyline of 2D points. For a road with N points we get
// N-1 segments and N-2 interior vertices:
//
//   p0 ──s0── p1 ──s1── p2 ──s2── p3
//              θ1        θ2
//
//   heading(s_i)   = atan2(dy, dx)
//   θ_j            = wrap(heading(s_j) - heading(s_j-1)) ∈ (-π, π]
//   κ_j            = θ_j / mean(|s_j-1|, |s_j|)
//
// Positive θ turns left (counter-clockwise). Curvature is undefined on a
// zero-length segment, so those are rejected up front rather than guarded.

use crate::error::{Result, SelectionError};
use crate::types::RoadPoint;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Segments shorter than this are degenerate. Also substituted for a
    /// vanishing curvature denominator.
    pub min_segment_length: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            min_segment_length: 1e-6,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Derived, immutable geometry of one road.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadGeometry {
    /// Euclidean length of each segment (N-1 entries).
    pub segment_lengths: Vec<f64>,
    /// Heading of each segment in radians (N-1 entries).
    pub headings: Vec<f64>,
    /// Arc length at each point, starting at 0 (N entries).
    pub cumulative_lengths: Vec<f64>,
    /// Signed turning angle at each interior vertex (N-2 entries).
    pub turning_angles: Vec<f64>,
    /// Signed curvature at each interior vertex (N-2 entries).
    pub curvatures: Vec<f64>,
    pub total_length: f64,
    pub direct_distance: f64,
}

impl RoadGeometry {
    pub fn segment_count(&self) -> usize {
        self.segment_lengths.len()
    }
}

// ============================================================================
// ANALYSIS
// ============================================================================

/// Build the canonical geometry for a road.
///
/// Fails with `InvalidGeometry` when there are fewer than 2 points, when a
/// coordinate is not finite, or when two consecutive points coincide within
/// `config.min_segment_length`.
pub fn analyze(
    test_id: &str,
    points: &[RoadPoint],
    config: &GeometryConfig,
) -> Result<RoadGeometry> {
    if points.len() < 2 {
        return Err(SelectionError::invalid_geometry(
            test_id,
            format!("road needs at least 2 points, got {}", points.len()),
        ));
    }

    if let Some(idx) = points
        .iter()
        .position(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return Err(SelectionError::invalid_geometry(
            test_id,
            format!("point {} has a non-finite coordinate", idx),
        ));
    }

    let eps = config.min_segment_length.max(f64::MIN_POSITIVE);
    let segment_count = points.len() - 1;

    let mut segment_lengths = Vec::with_capacity(segment_count);
    let mut headings = Vec::with_capacity(segment_count);
    let mut cumulative_lengths = Vec::with_capacity(points.len());
    cumulative_lengths.push(0.0);

    for (i, pair) in points.windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        let length = a.distance_to(&b);
        if length < eps {
            return Err(SelectionError::invalid_geometry(
                test_id,
                format!(
                    "zero-length segment between points {} and {} (len={:.3e})",
                    i,
                    i + 1,
                    length
                ),
            ));
        }
        segment_lengths.push(length);
        headings.push((b.y - a.y).atan2(b.x - a.x));
        let prev = cumulative_lengths[i];
        cumulative_lengths.push(prev + length);
    }

    let mut turning_angles = Vec::with_capacity(segment_count.saturating_sub(1));
    let mut curvatures = Vec::with_capacity(segment_count.saturating_sub(1));

    for j in 1..segment_count {
        let angle = wrap_angle(headings[j] - headings[j - 1]);
        let mean_len = (segment_lengths[j - 1] + segment_lengths[j]) / 2.0;
        let denom = if mean_len < eps { eps } else { mean_len };
        turning_angles.push(angle);
        curvatures.push(angle / denom);
    }

    let total_length = cumulative_lengths[segment_count];
    let direct_distance = points[0].distance_to(&points[points.len() - 1]);

    Ok(RoadGeometry {
        segment_lengths,
        headings,
        cumulative_lengths,
        turning_angles,
        curvatures,
        total_length,
        direct_distance,
    })
}

/// Normalize an angle to (-π, π].
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

// ============================================================================
// TESTS
// ============================================================================
