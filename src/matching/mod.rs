//! Candidate classification against an expected title, year and season.

pub mod classifier;

pub use classifier::{
    Classifier, Expectation, MatchResult, RejectReason, Strictness, Thresholds,
};

use std::collections::HashSet;

/// Candidate titles already acted upon during one reconciliation pass.
///
/// Transient: a fresh set is created per pass and never persisted.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    titles: HashSet<String>,
}

impl ProcessedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the title was already present.
    pub fn insert(&mut self, title: impl Into<String>) -> bool {
        self.titles.insert(title.into())
    }

    #[must_use]
    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}
