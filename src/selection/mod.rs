// src/selection/mod.rs

pub mod diversity;
pub mod selector;
pub mod state;

pub use diversity::{cosine_similarity, DiversityTracker};
pub use selector::{
    Diagnostic, EmptyPoolPolicy, ScoredTest, SelectedTest, SelectionOutcome, SelectionPolicy,
    Selector, SelectorConfig,
};
pub use state::SelectionState;
