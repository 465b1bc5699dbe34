//! Weighted, typed edges with Hebbian reinforcement and decay
//!
//! Edges are the engine's persistent output:
//! - Created with weight 1.0 on first detection
//! - Reinforced (weight raised) on every later detection of the same key
//! - Decayed multiplicatively once per nightly cycle
//! - Pruned once their weight falls below viability

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::{Candidate, DateRange, INITIAL_WEIGHT};

/// Unique identity of an edge: at most one edge exists per key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub from_id: String,
    pub to_id: String,
    pub kind: String,
}

impl EdgeKey {
    pub fn new(from_id: &str, to_id: &str, kind: &str) -> Self {
        Self {
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            kind: kind.to_string(),
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from_id, self.kind, self.to_id)
    }
}

/// Bookkeeping carried alongside an edge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeMetadata {
    /// Number of reinforcements since creation
    #[serde(default)]
    pub reinforcement_count: u32,

    /// Strategies that have detected this relation
    #[serde(default)]
    pub detected_by: Vec<String>,

    /// Captures that contributed a detection
    #[serde(default)]
    pub detected_in_captures: Vec<String>,

    /// Evidence recorded at creation
    #[serde(default, flatten)]
    pub evidence: Map<String, Value>,
}

impl EdgeMetadata {
    fn record(&mut self, strategies: &[String], captures: &[String]) {
        for strategy in strategies {
            if !self.detected_by.contains(strategy) {
                self.detected_by.push(strategy.clone());
            }
        }
        for capture in captures {
            if !self.detected_in_captures.contains(capture) {
                self.detected_in_captures.push(capture.clone());
            }
        }
    }
}

/// A directed, typed relationship between two entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: Uuid,
    pub from_id: String,
    pub to_id: String,
    pub kind: String,

    /// Confidence (0.0 - 1.0); only ever raised by reinforcement
    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Synaptic strength, never negative
    pub weight: f64,

    pub last_reinforced_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    /// Capture that first produced the edge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_capture_id: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub metadata: EdgeMetadata,
}

impl Edge {
    /// A bare edge with initial weight, for fixtures and upstream imports
    pub fn new(from_id: &str, to_id: &str, kind: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            kind: kind.to_string(),
            confidence: 1.0,
            importance: None,
            description: None,
            weight: INITIAL_WEIGHT,
            last_reinforced_at: now,
            start_date: None,
            end_date: None,
            source_capture_id: None,
            created_at: now,
            metadata: EdgeMetadata::default(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.max(0.0);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_last_reinforced_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_reinforced_at = at;
        self
    }

    /// Create an edge from its first surviving detection
    pub fn create(upsert: &EdgeUpsert, now: DateTime<Utc>) -> Self {
        let mut metadata = EdgeMetadata {
            evidence: upsert.evidence.clone(),
            ..Default::default()
        };
        metadata.record(&upsert.detected_by, &upsert.captures);

        Self {
            id: Uuid::new_v4(),
            from_id: upsert.key.from_id.clone(),
            to_id: upsert.key.to_id.clone(),
            kind: upsert.key.kind.clone(),
            confidence: upsert.confidence,
            importance: upsert.importance,
            description: upsert.description.clone(),
            weight: INITIAL_WEIGHT,
            last_reinforced_at: now,
            start_date: upsert.start_date,
            end_date: upsert.end_date,
            source_capture_id: upsert.captures.first().cloned(),
            created_at: now,
            metadata,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(&self.from_id, &self.to_id, &self.kind)
    }

    /// Strengthen the edge on re-detection (long-term potentiation)
    pub fn reinforce(&mut self, upsert: &EdgeUpsert, step: f64, now: DateTime<Utc>) {
        self.weight += step.max(0.0);
        self.last_reinforced_at = now;
        self.confidence = self.confidence.max(upsert.confidence);

        if self.description.is_none() {
            self.description = upsert.description.clone();
        }
        if self.importance.is_none() {
            self.importance = upsert.importance;
        }

        self.metadata.reinforcement_count += 1;
        self.metadata.record(&upsert.detected_by, &upsert.captures);
    }

    /// Multiply the weight by `factor`
    pub fn decay(&mut self, factor: f64) {
        self.weight = (self.weight * factor).max(0.0);
    }

    /// Whether the edge survives pruning at `threshold`
    pub fn is_viable(&self, threshold: f64) -> bool {
        self.weight >= threshold
    }

    /// Temporal bounds, if the edge is dated
    pub fn date_range(&self) -> Option<DateRange> {
        let range = DateRange::new(self.start_date, self.end_date);
        range.is_dated().then_some(range)
    }
}

/// One write unit for the store: all surviving candidates of a key in a run
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeUpsert {
    pub key: EdgeKey,
    pub confidence: f64,
    pub importance: Option<f64>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub evidence: Map<String, Value>,
    pub detected_by: Vec<String>,
    pub captures: Vec<String>,
}

impl EdgeUpsert {
    pub fn from_candidate(candidate: Candidate) -> Self {
        let key = candidate.key();
        let mut upsert = Self {
            key,
            confidence: candidate.confidence,
            importance: candidate.importance,
            description: candidate.description,
            start_date: candidate.start_date,
            end_date: candidate.end_date,
            evidence: candidate.evidence,
            detected_by: Vec::new(),
            captures: Vec::new(),
        };
        if !candidate.strategy.is_empty() {
            upsert.detected_by.push(candidate.strategy);
        }
        if let Some(capture) = candidate.source_capture_id {
            upsert.captures.push(capture);
        }
        upsert
    }

    /// Fold another candidate of the same key into this write
    pub fn absorb(&mut self, candidate: Candidate) {
        debug_assert_eq!(self.key, candidate.key());

        if candidate.confidence > self.confidence {
            self.confidence = candidate.confidence;
            if candidate.description.is_some() {
                self.description = candidate.description;
            }
        } else if self.description.is_none() {
            self.description = candidate.description;
        }

        self.importance = match (self.importance, candidate.importance) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.start_date = self.start_date.or(candidate.start_date);
        self.end_date = self.end_date.or(candidate.end_date);

        for (key, value) in candidate.evidence {
            self.evidence.entry(key).or_insert(value);
        }
        if !candidate.strategy.is_empty() && !self.detected_by.contains(&candidate.strategy) {
            self.detected_by.push(candidate.strategy);
        }
        if let Some(capture) = candidate.source_capture_id {
            if !self.captures.contains(&capture) {
                self.captures.push(capture);
            }
        }
    }
}

/// Merge candidates by edge key, keeping first-seen order
pub fn coalesce(candidates: Vec<Candidate>) -> Vec<EdgeUpsert> {
    let mut index: HashMap<EdgeKey, usize> = HashMap::new();
    let mut upserts: Vec<EdgeUpsert> = Vec::new();

    for candidate in candidates {
        let key = candidate.key();
        match index.get(&key) {
            Some(&i) => upserts[i].absorb(candidate),
            None => {
                index.insert(key, upserts.len());
                upserts.push(EdgeUpsert::from_candidate(candidate));
            }
        }
    }

    upserts
}
