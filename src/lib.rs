// src/lib.rs
//
// Regression-test selection for self-driving-car road simulation suites.
//
//   TestCase → geometry::analyze → geometry::extract → Scorer ↔ DiversityTracker
//            → Selector (threshold | top_k | group_quota) → SelectionOutcome

pub mod config;
pub mod error;
pub mod geometry;
pub mod inference;
pub mod interface;
pub mod pipeline;
pub mod scoring;
pub mod selection;
pub mod types;

pub use config::{EngineConfig, LoggingConfig};
pub use error::{ErrorKind, Result, SelectionError};
pub use interface::{
    ErrorResponse, InitRequest, ScoreReport, SelectRequest, SelectResponse, SelectionService,
};
pub use scoring::{InjectedModels, Scorer, SelectionScore, StrategyConfig, StrategyKind};
pub use selection::{SelectionOutcome, SelectionPolicy, Selector, SelectorConfig};
pub use types::{HistoricalRecord, RoadPoint, TestCase};
