// src/error.rs
//
// Error taxonomy for the selection engine.
//
// Geometry errors are per-test: the selector records them as diagnostics and
// keeps going unless strict mode is on. Config and model errors are fatal at
// initialization.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelectionError {
    /// Malformed road input: too few points, non-finite coordinates, or a
    /// degenerate (zero-length) segment.
    #[error("Invalid geometry for test '{test_id}': {reason}")]
    InvalidGeometry { test_id: String, reason: String },

    /// Contradictory or out-of-range selection parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A learned strategy's model artifact failed to load, failed at inference
    /// time, or does not match the expected feature dimensionality.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Empty candidate pool under `EmptyPoolPolicy::Reject`.
    #[error("Candidate pool is empty")]
    EmptyPool,
}

impl SelectionError {
    pub fn invalid_geometry(test_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            test_id: test_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidGeometry { .. } => ErrorKind::InvalidGeometry,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Self::EmptyPool => ErrorKind::EmptyPool,
        }
    }

    /// Test case responsible for the error, when there is one.
    pub fn test_id(&self) -> Option<&str> {
        match self {
            Self::InvalidGeometry { test_id, .. } => Some(test_id),
            _ => None,
        }
    }
}

/// Stable, serializable error discriminant for the request/response surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidGeometry,
    InvalidConfig,
    ModelUnavailable,
    EmptyPool,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidGeometry => "INVALID_GEOMETRY",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::ModelUnavailable => "MODEL_UNAVAILABLE",
            ErrorKind::EmptyPool => "EMPTY_POOL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, SelectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_error_carries_test_id() {
        let err = SelectionError::invalid_geometry("road_7", "fewer than 2 points");
        assert_eq!(err.kind(), ErrorKind::InvalidGeometry);
        assert_eq!(err.test_id(), Some("road_7"));
        assert!(err.to_string().contains("road_7"));
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::ModelUnavailable).unwrap();
        assert_eq!(json, "\"MODEL_UNAVAILABLE\"");
        assert_eq!(SelectionError::EmptyPool.test_id(), None);
    }
}
