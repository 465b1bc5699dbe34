//! Candidate relations emitted by detection strategies
//!
//! A candidate is transient: it is filtered by confidence and then merged
//! into the store by the reinforcement engine. Candidates are never persisted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::EdgeKey;

/// A proposed relation, prior to filtering and reinforcement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub from_id: String,
    pub to_id: String,
    pub kind: String,

    /// Detector confidence (0.0 - 1.0)
    pub confidence: f64,

    /// Significance of the connection (0.0 - 1.0)
    pub importance: Option<f64>,

    /// Human-readable role or context
    pub description: Option<String>,

    /// Temporal bounds of the relation
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    /// Strategy-specific evidence (pattern name, similarity score, ...)
    pub evidence: Map<String, Value>,

    /// Name of the emitting strategy
    pub strategy: String,

    /// Capture that triggered the detection, when known
    pub source_capture_id: Option<String>,
}

impl Candidate {
    /// Create a new candidate builder
    pub fn builder(from_id: &str, to_id: &str, kind: &str) -> CandidateBuilder {
        CandidateBuilder::new(from_id, to_id, kind)
    }

    /// Identity of the edge this candidate resolves to
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(&self.from_id, &self.to_id, &self.kind)
    }

    pub fn is_self_loop(&self) -> bool {
        self.from_id == self.to_id
    }
}

/// Builder for candidates
pub struct CandidateBuilder {
    from_id: String,
    to_id: String,
    kind: String,
    confidence: f64,
    importance: Option<f64>,
    description: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    evidence: Map<String, Value>,
    strategy: String,
    source_capture_id: Option<String>,
}

impl CandidateBuilder {
    pub fn new(from_id: &str, to_id: &str, kind: &str) -> Self {
        Self {
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            kind: kind.to_string(),
            confidence: 1.0,
            importance: None,
            description: None,
            start_date: None,
            end_date: None,
            evidence: Map::new(),
            strategy: String::new(),
            source_capture_id: None,
        }
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance.clamp(0.0, 1.0));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn evidence(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.evidence.insert(key.to_string(), value.into());
        self
    }

    pub fn strategy(mut self, strategy: &str) -> Self {
        self.strategy = strategy.to_string();
        self
    }

    pub fn source_capture(mut self, capture_id: Option<&str>) -> Self {
        self.source_capture_id = capture_id.map(str::to_string);
        self
    }

    pub fn build(self) -> Candidate {
        Candidate {
            from_id: self.from_id,
            to_id: self.to_id,
            kind: self.kind,
            confidence: self.confidence,
            importance: self.importance,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            evidence: self.evidence,
            strategy: self.strategy,
            source_capture_id: self.source_capture_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_builder() {
        let candidate = Candidate::builder("p-1", "o-1", "works_at")
            .confidence(1.7)
            .description("CTO")
            .evidence("pattern", "role_at_organization")
            .strategy("pattern")
            .build();

        assert_eq!(candidate.confidence, 1.0);
        assert_eq!(candidate.description.as_deref(), Some("CTO"));
        assert_eq!(candidate.key(), EdgeKey::new("p-1", "o-1", "works_at"));
        assert!(!candidate.is_self_loop());
    }
}
