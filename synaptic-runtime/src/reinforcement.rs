//! Reinforcement - merging candidates into the store
//!
//! Each coalesced upsert is one atomic store write: create the edge at weight
//! 1.0, or raise an existing edge's weight by the reinforcement step.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use synaptic_core::EdgeUpsert;
use synaptic_store::{SharedStore, StoreError, UpsertOutcome};

/// Write counts for one reinforcement pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReinforcementStats {
    pub created: usize,
    pub updated: usize,
    /// Writes that failed and were skipped
    pub failed: usize,
    /// Upserts dropped by the per-run cap
    pub capped: usize,
}

/// Applies upserts to the store
pub struct Reinforcer {
    store: SharedStore,
    step: f64,
    max_writes: usize,
}

impl Reinforcer {
    pub fn new(store: SharedStore, step: f64, max_writes: usize) -> Self {
        Self {
            store,
            step,
            max_writes,
        }
    }

    /// Write every upsert, in order
    ///
    /// A failed write is logged and skipped. An unavailable store aborts the
    /// pass; writes already made stay committed.
    pub async fn apply(
        &self,
        upserts: Vec<EdgeUpsert>,
        now: DateTime<Utc>,
    ) -> Result<ReinforcementStats, StoreError> {
        let mut stats = ReinforcementStats::default();

        if upserts.len() > self.max_writes {
            stats.capped = upserts.len() - self.max_writes;
            warn!(
                "{} upserts exceed the per-run cap of {}; dropping {}",
                upserts.len(),
                self.max_writes,
                stats.capped
            );
        }

        for upsert in upserts.into_iter().take(self.max_writes) {
            match self.store.upsert_edge(&upsert, self.step, now).await {
                Ok(UpsertOutcome::Created(edge)) => {
                    debug!("Created edge {} (confidence {:.2})", upsert.key, edge.confidence);
                    stats.created += 1;
                }
                Ok(UpsertOutcome::Reinforced {
                    previous_weight,
                    edge,
                }) => {
                    debug!(
                        "Reinforced edge {}: {:.3} -> {:.3}",
                        upsert.key, previous_weight, edge.weight
                    );
                    stats.updated += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Skipping edge {}: {}", upsert.key, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use synaptic_core::{coalesce, Candidate, EdgeKey};
    use synaptic_store::{GraphStore, InMemoryGraphStore};

    fn upserts(targets: &[&str]) -> Vec<EdgeUpsert> {
        coalesce(
            targets
                .iter()
                .map(|to| {
                    Candidate::builder("p-1", to, "works_at")
                        .confidence(0.9)
                        .strategy("pattern")
                        .build()
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_create_then_reinforce() {
        let store = Arc::new(InMemoryGraphStore::new());
        let reinforcer = Reinforcer::new(store.clone(), 1.0, 100);

        let stats = reinforcer.apply(upserts(&["o-1", "o-2"]), Utc::now()).await.unwrap();
        assert_eq!((stats.created, stats.updated), (2, 0));

        let stats = reinforcer.apply(upserts(&["o-1"]), Utc::now()).await.unwrap();
        assert_eq!((stats.created, stats.updated), (0, 1));

        let edge = store
            .get_edge(&EdgeKey::new("p-1", "o-1", "works_at"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edge.weight, 2.0);
    }

    #[tokio::test]
    async fn test_custom_step() {
        let store = Arc::new(InMemoryGraphStore::new());
        let reinforcer = Reinforcer::new(store.clone(), 0.25, 100);

        reinforcer.apply(upserts(&["o-1"]), Utc::now()).await.unwrap();
        reinforcer.apply(upserts(&["o-1"]), Utc::now()).await.unwrap();

        let edges = store.all_edges().await.unwrap();
        assert_eq!(edges[0].weight, 1.25);
    }

    #[tokio::test]
    async fn test_cap_limits_writes() {
        let store = Arc::new(InMemoryGraphStore::new());
        let reinforcer = Reinforcer::new(store.clone(), 1.0, 2);

        let stats = reinforcer
            .apply(upserts(&["o-1", "o-2", "o-3"]), Utc::now())
            .await
            .unwrap();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.capped, 1);
        assert_eq!(store.edge_count(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_store_aborts() {
        let store = Arc::new(InMemoryGraphStore::new());
        store.set_offline(true);
        let reinforcer = Reinforcer::new(store, 1.0, 100);

        let err = reinforcer.apply(upserts(&["o-1"]), Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
