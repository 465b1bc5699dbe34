//! Topology strategy
//!
//! One-hop transitive inference: A -> B and B -> C suggest A ~> C.
//! Only registered transitive kinds are chained; an empty registry chains
//! every kind except the inferred kind itself.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, info};

use synaptic_core::{kinds, Candidate, GraphView, TopologyConfig};

use crate::{names, DetectionStrategy, StrategyError};

const TOPOLOGY_IMPORTANCE: f64 = 0.4;

/// Transitive-closure detector
pub struct TopologyStrategy {
    transitive_kinds: HashSet<String>,
    confidence: f64,
}

impl TopologyStrategy {
    pub fn new(config: &TopologyConfig) -> Self {
        Self {
            transitive_kinds: config.transitive_kinds.iter().cloned().collect(),
            confidence: config.confidence,
        }
    }

    pub fn is_transitive(&self, kind: &str) -> bool {
        if self.transitive_kinds.is_empty() {
            kind != kinds::INFERRED_CONNECTION
        } else {
            self.transitive_kinds.contains(kind)
        }
    }
}

impl Default for TopologyStrategy {
    fn default() -> Self {
        Self::new(&TopologyConfig::default())
    }
}

#[async_trait]
impl DetectionStrategy for TopologyStrategy {
    fn name(&self) -> &str {
        names::TOPOLOGY
    }

    async fn detect(&self, view: &GraphView) -> Result<Vec<Candidate>, StrategyError> {
        let mut candidates = Vec::new();
        let mut checked: HashSet<(&str, &str)> = HashSet::new();

        for a in view.scope() {
            for first in view.outgoing(a).filter(|e| self.is_transitive(&e.kind)) {
                let b = first.to_id.as_str();
                if b == a {
                    continue;
                }

                for second in view.outgoing(b).filter(|e| self.is_transitive(&e.kind)) {
                    let c = second.to_id.as_str();
                    if c == a || c == b {
                        continue;
                    }
                    if !checked.insert((a.as_str(), c)) {
                        continue;
                    }
                    if view.has_any_edge(a, c) {
                        debug!("{} -> {} already connected, not inferring", a, c);
                        continue;
                    }

                    let via = view.entity(b).map(|e| e.title.as_str()).unwrap_or(b);
                    candidates.push(
                        Candidate::builder(a, c, kinds::INFERRED_CONNECTION)
                            .confidence(self.confidence)
                            .importance(TOPOLOGY_IMPORTANCE)
                            .description(format!("Inferred via {}", via))
                            .evidence("intermediate_entity_id", b)
                            .evidence("first_edge_kind", first.kind.as_str())
                            .evidence("second_edge_kind", second.kind.as_str())
                            .strategy(names::TOPOLOGY)
                            .source_capture(view.source_capture_id())
                            .build(),
                    );
                }
            }
        }

        info!(
            "Topology strategy found {} transitive connections",
            candidates.len()
        );
        Ok(candidates)
    }
}
