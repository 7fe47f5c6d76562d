// src/types.rs

use serde::{Deserialize, Serialize};

/// A single centerline vertex. Order within a road is significant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadPoint {
    pub x: f64,
    pub y: f64,
}

impl RoadPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &RoadPoint) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

impl From<(f64, f64)> for RoadPoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Outcome of prior simulator runs for a test, supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub passes: u32,
    pub failures: u32,
    /// Runs elapsed since this test was last selected. `Some(0)` = selected in
    /// the previous run, `None` = never selected.
    #[serde(default)]
    pub runs_since_selected: Option<u32>,
}

impl HistoricalRecord {
    pub fn total_runs(&self) -> u32 {
        self.passes.saturating_add(self.failures)
    }

    pub fn has_failed(&self) -> bool {
        self.failures > 0
    }
}

/// A road-geometry simulation test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub points: Vec<RoadPoint>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub history: Option<HistoricalRecord>,
}

impl TestCase {
    pub fn new(id: impl Into<String>, points: Vec<RoadPoint>) -> Self {
        Self {
            id: id.into(),
            points,
            group: None,
            history: None,
        }
    }

    pub fn from_xy(id: impl Into<String>, xy: &[(f64, f64)]) -> Self {
        Self::new(id, xy.iter().copied().map(RoadPoint::from).collect())
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_history(mut self, history: HistoricalRecord) -> Self {
        self.history = Some(history);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_deserializes_with_optional_fields_missing() {
        let json = r#"{"id":"t1","points":[{"x":0.0,"y":0.0},{"x":1.0,"y":0.0}]}"#;
        let tc: TestCase = serde_json::from_str(json).unwrap();
        assert_eq!(tc.id, "t1");
        assert_eq!(tc.points.len(), 2);
        assert!(tc.group.is_none());
        assert!(tc.history.is_none());
    }

    #[test]
    fn test_history_totals() {
        let h = HistoricalRecord {
            passes: 3,
            failures: 2,
            runs_since_selected: None,
        };
        assert_eq!(h.total_runs(), 5);
        assert!(h.has_failed());
        assert!(!HistoricalRecord::default().has_failed());
    }
}
