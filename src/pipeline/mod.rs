// src/pipeline/mod.rs

pub mod extraction;
pub mod metrics;

pub use extraction::{extract_pool, ExtractionReport};
pub use metrics::{RunMetrics, RunSummary};
