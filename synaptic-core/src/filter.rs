//! Confidence filter - the quality gate between detection and persistence

use crate::Candidate;

/// Drops candidates below a minimum confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceFilter {
    pub min_confidence: f64,
}

impl ConfidenceFilter {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Keep candidates with `confidence >= min_confidence`
    pub fn apply(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        filter_by_confidence(candidates, self.min_confidence)
    }

    pub fn accepts(&self, candidate: &Candidate) -> bool {
        candidate.confidence >= self.min_confidence
    }
}

/// Keep candidates with `confidence >= min_confidence`, in order
pub fn filter_by_confidence(candidates: Vec<Candidate>, min_confidence: f64) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| c.confidence >= min_confidence)
        .collect()
}
