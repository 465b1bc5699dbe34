//! Decay scheduler - nightly forgetting
//!
//! One global pass per nightly run: multiply every edge weight by the decay
//! factor, then delete the edges that fell below the prune threshold.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use synaptic_core::EngineConfig;
use synaptic_store::{SharedStore, StoreError};

/// Counts from one decay pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecayStats {
    pub decayed: usize,
    pub pruned: usize,
    /// Deletes that failed and were skipped
    pub prune_failures: usize,
}

/// Global decay and pruning
pub struct DecayScheduler {
    store: SharedStore,
    decay_factor: f64,
    prune_threshold: f64,
    grace_window: Option<Duration>,
}

impl DecayScheduler {
    pub fn new(store: SharedStore, config: &EngineConfig) -> Self {
        Self {
            store,
            decay_factor: config.decay_factor,
            prune_threshold: config.prune_threshold,
            grace_window: config.decay_grace_window(),
        }
    }

    /// Decay, then prune
    pub async fn run(&self, now: DateTime<Utc>) -> Result<DecayStats, StoreError> {
        let exempt_since = self.grace_window.map(|window| now - window);
        if let Some(cutoff) = exempt_since {
            debug!("Edges reinforced since {} are exempt from decay", cutoff);
        }

        let decayed = self
            .store
            .decay_edges(self.decay_factor, exempt_since)
            .await?;

        let mut stats = DecayStats {
            decayed,
            ..Default::default()
        };

        let weak = self.store.edges_below_weight(self.prune_threshold).await?;
        for edge in weak {
            match self.store.delete_edge(edge.id).await {
                Ok(true) => {
                    debug!("Pruned {} (weight {:.4})", edge.key(), edge.weight);
                    stats.pruned += 1;
                }
                Ok(false) => debug!("Edge {} already gone", edge.id),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Failed to prune {}: {}", edge.key(), e);
                    stats.prune_failures += 1;
                }
            }
        }

        info!(
            "Decay pass: {} edges decayed by {}, {} pruned below {}",
            stats.decayed, self.decay_factor, stats.pruned, self.prune_threshold
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use synaptic_core::{Edge, EdgeKey};
    use synaptic_store::{GraphStore, InMemoryGraphStore};

    fn config(decay_factor: f64, grace_secs: u64) -> EngineConfig {
        EngineConfig {
            decay_factor,
            decay_grace_window_secs: grace_secs,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_decay_then_prune() {
        let store = Arc::new(InMemoryGraphStore::new());
        store.insert_edge(Edge::new("a", "b", "knows").with_weight(0.05));
        store.insert_edge(Edge::new("a", "c", "knows").with_weight(1.0));

        let stats = DecayScheduler::new(store.clone(), &config(0.9, 0))
            .run(Utc::now())
            .await
            .unwrap();

        assert_eq!(stats.decayed, 2);
        assert_eq!(stats.pruned, 1);

        let survivor = store
            .get_edge(&EdgeKey::new("a", "c", "knows"))
            .await
            .unwrap()
            .unwrap();
        assert!((survivor.weight - 0.9).abs() < 1e-12);
        assert!(store
            .get_edge(&EdgeKey::new("a", "b", "knows"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_threshold_edge_survives() {
        let store = Arc::new(InMemoryGraphStore::new());
        // 0.2 * 0.5 == 0.1 exactly: not below the threshold
        store.insert_edge(Edge::new("a", "b", "knows").with_weight(0.2));

        let stats = DecayScheduler::new(store.clone(), &config(0.5, 0))
            .run(Utc::now())
            .await
            .unwrap();
        assert_eq!(stats.pruned, 0);
        assert_eq!(store.edge_count(), 1);
    }

    #[tokio::test]
    async fn test_grace_window() {
        let store = Arc::new(InMemoryGraphStore::new());
        let now = Utc::now();
        store.insert_edge(
            Edge::new("a", "b", "knows")
                .with_weight(1.0)
                .with_last_reinforced_at(now - Duration::minutes(5)),
        );
        store.insert_edge(
            Edge::new("a", "c", "knows")
                .with_weight(1.0)
                .with_last_reinforced_at(now - Duration::days(2)),
        );

        let stats = DecayScheduler::new(store.clone(), &config(0.5, 3600))
            .run(now)
            .await
            .unwrap();
        assert_eq!(stats.decayed, 1);

        let fresh = store.get_edge(&EdgeKey::new("a", "b", "knows")).await.unwrap().unwrap();
        let stale = store.get_edge(&EdgeKey::new("a", "c", "knows")).await.unwrap().unwrap();
        assert_eq!(fresh.weight, 1.0);
        assert_eq!(stale.weight, 0.5);
    }
}
