//! Run result record

use serde::{Deserialize, Serialize};

/// Outcome of one engine run (incremental or nightly)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub edges_created: usize,
    pub edges_updated: usize,
    /// Always 0 outside nightly mode
    pub edges_pruned: usize,
    pub edges_decayed: usize,
    pub entities_analyzed: usize,
    /// Candidates emitted by all strategies, before filtering
    pub candidates_detected: usize,
    /// Candidates dropped before reinforcement: self-loops plus those below
    /// `min_confidence`
    pub candidates_filtered: usize,
    /// Strategies that ran this cycle (including ones that failed)
    pub strategies_run: Vec<String>,
    /// Wall-clock seconds
    pub processing_time: f64,
}

impl RunResult {
    /// Total edges written (created or reinforced)
    pub fn edges_written(&self) -> usize {
        self.edges_created + self.edges_updated
    }
}
