// src/pipeline/metrics.rs
//
// Per-run observability. Counters are atomics so the parallel extraction
// stage can bump them without locking; the selector snapshots them into a
// serializable summary at the end of the run.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub tests_received: Arc<AtomicU64>,
    pub tests_extracted: Arc<AtomicU64>,
    pub tests_excluded: Arc<AtomicU64>,
    pub tests_selected: Arc<AtomicU64>,
    pub score_evaluations: Arc<AtomicU64>,
    pub extraction_time_us: Arc<AtomicU64>,
    pub precompute_time_us: Arc<AtomicU64>,
    pub selection_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            tests_received: Arc::new(AtomicU64::new(0)),
            tests_extracted: Arc::new(AtomicU64::new(0)),
            tests_excluded: Arc::new(AtomicU64::new(0)),
            tests_selected: Arc::new(AtomicU64::new(0)),
            score_evaluations: Arc::new(AtomicU64::new(0)),
            extraction_time_us: Arc::new(AtomicU64::new(0)),
            precompute_time_us: Arc::new(AtomicU64::new(0)),
            selection_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set(&self, counter: &AtomicU64, value: u64) {
        counter.store(value, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, elapsed: Duration) {
        counter.store(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            tests_received: self.tests_received.load(Ordering::Relaxed),
            tests_extracted: self.tests_extracted.load(Ordering::Relaxed),
            tests_excluded: self.tests_excluded.load(Ordering::Relaxed),
            tests_selected: self.tests_selected.load(Ordering::Relaxed),
            score_evaluations: self.score_evaluations.load(Ordering::Relaxed),
            extraction_us: self.extraction_time_us.load(Ordering::Relaxed),
            precompute_us: self.precompute_time_us.load(Ordering::Relaxed),
            selection_us: self.selection_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub tests_received: u64,
    pub tests_extracted: u64,
    pub tests_excluded: u64,
    pub tests_selected: u64,
    pub score_evaluations: u64,
    pub extraction_us: u64,
    pub precompute_us: u64,
    pub selection_us: u64,
    pub elapsed_secs: f64,
}
