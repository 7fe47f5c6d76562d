// src/pipeline/extraction.rs
//
// Stage 1 of a run: geometry analysis + feature extraction for the whole
// pool. Tests are independent here, so the stage fans out with rayon and
// then splits the results back into input order.

use super::metrics::RunMetrics;
use crate::error::SelectionError;
use crate::geometry::{analyze, extract, extract_sequence, FeatureConfig, GeometryConfig};
use crate::scoring::Candidate;
use crate::types::TestCase;
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

/// Extraction result for one pool. Both lists are in input order.
#[derive(Debug)]
pub struct ExtractionReport<'a> {
    pub candidates: Vec<Candidate<'a>>,
    /// (input index, error) for every test that could not be analyzed.
    pub rejected: Vec<(usize, SelectionError)>,
}

pub fn extract_pool<'a>(
    pool: &'a [TestCase],
    geometry: &GeometryConfig,
    features: &FeatureConfig,
    metrics: &RunMetrics,
) -> ExtractionReport<'a> {
    let start = Instant::now();

    let results: Vec<Result<Candidate<'a>, SelectionError>> = pool
        .par_iter()
        .enumerate()
        .map(|(index, test)| -> Result<Candidate<'a>, SelectionError> {
            let road = analyze(&test.id, &test.points, geometry)?;
            Ok(Candidate {
                index,
                test,
                features: extract(&road, features),
                sequence: extract_sequence(&road, features),
                geometry: road,
            })
        })
        .collect();

    // Ids key the run state, so only the first test with a given id runs.
    let mut first_seen: HashMap<&str, usize> = HashMap::with_capacity(pool.len());
    let mut candidates = Vec::with_capacity(results.len());
    let mut rejected = Vec::new();
    for (index, result) in results.into_iter().enumerate() {
        let id = pool[index].id.as_str();
        let result = match first_seen.entry(id) {
            Entry::Occupied(first) => Err(SelectionError::invalid_geometry(
                id,
                format!("duplicate test id, first seen at #{}", first.get()),
            )),
            Entry::Vacant(slot) => {
                slot.insert(index);
                result
            }
        };
        match result {
            Ok(candidate) => {
                metrics.inc(&metrics.tests_extracted);
                candidates.push(candidate);
            }
            Err(err) => {
                warn!("⚠️  Excluding test #{}: {}", index, err);
                metrics.inc(&metrics.tests_excluded);
                rejected.push((index, err));
            }
        }
    }

    metrics.set_timing(&metrics.extraction_time_us, start.elapsed());
    debug!(
        "Extracted {} candidates, {} rejected in {:.1}ms",
        candidates.len(),
        rejected.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    ExtractionReport {
        candidates,
        rejected,
    }
}
