// src/selection/state.rs

use crate::geometry::FeatureVector;
use std::collections::{HashMap, HashSet};

/// Mutable bookkeeping for one selection run.
///
/// Constructed fresh by the selector at the start of every run and dropped
/// at the end. Only `DiversityTracker::observe` writes to it.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    selected_features: Vec<FeatureVector>,
    selected_ids: HashSet<String>,
    /// Ids in selection order.
    order: Vec<String>,
    /// Keyed by group label; unlabeled tests share the `None` bucket.
    group_counts: HashMap<Option<String>, usize>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected_ids.contains(id)
    }

    pub fn selected_features(&self) -> &[FeatureVector] {
        &self.selected_features
    }

    pub fn selection_order(&self) -> &[String] {
        &self.order
    }

    pub fn group_count(&self, group: Option<&str>) -> usize {
        self.group_counts
            .get(&group.map(str::to_string))
            .copied()
            .unwrap_or(0)
    }

    /// Returns false when `id` was already recorded this run.
    pub(crate) fn record(&mut self, id: &str, features: FeatureVector, group: Option<&str>) -> bool {
        if !self.selected_ids.insert(id.to_string()) {
            return false;
        }
        self.selected_features.push(features);
        self.order.push(id.to_string());
        *self
            .group_counts
            .entry(group.map(str::to_string))
            .or_insert(0) += 1;
        true
    }
}
