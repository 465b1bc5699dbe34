//! In-memory graph store
//!
//! Edges live in a `DashMap` keyed by `EdgeKey`. Upserts go through the map's
//! entry API, which holds the shard lock for the key while the edge is created
//! or reinforced, so concurrent detections of one key never produce duplicates
//! or lost updates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};
use uuid::Uuid;

use synaptic_core::{Edge, EdgeKey, EdgeUpsert, Entity};

use crate::{GraphSnapshot, GraphStore, StoreError, UpsertOutcome};

/// Graph store held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    entities: DashMap<String, Entity>,
    edges: DashMap<EdgeKey, Edge>,
    last_nightly_run: RwLock<Option<DateTime<Utc>>>,
    offline: AtomicBool,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot; later edges win on duplicate keys
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let store = Self::new();
        for entity in snapshot.entities {
            store.insert_entity(entity);
        }
        for edge in snapshot.edges {
            store.insert_edge(edge);
        }
        *store.last_nightly_run.write() = snapshot.last_nightly_run;
        store
    }

    /// Copy of the current contents, sorted for stable output
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut entities: Vec<Entity> = self.entities.iter().map(|e| e.value().clone()).collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges: Vec<Edge> = self.edges.iter().map(|e| e.value().clone()).collect();
        edges.sort_by(|a, b| a.key().cmp(&b.key()));

        GraphSnapshot {
            entities,
            edges,
            last_nightly_run: *self.last_nightly_run.read(),
        }
    }

    /// Insert or replace an entity
    pub fn insert_entity(&self, entity: Entity) {
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Insert or replace the edge for its key, bypassing reinforcement
    pub fn insert_edge(&self, edge: Edge) {
        self.edges.insert(edge.key(), edge);
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Make every call fail with `StoreError::Unavailable` until reset
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn collect_entities<F>(&self, predicate: F) -> Vec<Entity>
    where
        F: Fn(&Entity) -> bool,
    {
        let mut found: Vec<Entity> = self
            .entities
            .iter()
            .filter(|e| predicate(e.value()))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    fn collect_edges<F>(&self, predicate: F) -> Vec<Edge>
    where
        F: Fn(&Edge) -> bool,
    {
        let mut found: Vec<Edge> = self
            .edges
            .iter()
            .filter(|e| predicate(e.value()))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by(|a, b| a.key().cmp(&b.key()));
        found
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>, StoreError> {
        self.ensure_online()?;
        Ok(self.entities.get(id).map(|e| e.value().clone()))
    }

    async fn entities_by_ids(&self, ids: &[String]) -> Result<Vec<Entity>, StoreError> {
        self.ensure_online()?;
        Ok(ids
            .iter()
            .filter_map(|id| self.entities.get(id).map(|e| e.value().clone()))
            .collect())
    }

    async fn entities_by_type(&self, entity_type: &str) -> Result<Vec<Entity>, StoreError> {
        self.ensure_online()?;
        Ok(self.collect_entities(|e| e.is_type(entity_type)))
    }

    async fn entities_by_source(&self, capture_id: &str) -> Result<Vec<Entity>, StoreError> {
        self.ensure_online()?;
        Ok(self.collect_entities(|e| e.source_capture_id.as_deref() == Some(capture_id)))
    }

    async fn entities_changed_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Entity>, StoreError> {
        self.ensure_online()?;
        Ok(self.collect_entities(|e| e.last_changed_at() > since))
    }

    async fn all_entities(&self) -> Result<Vec<Entity>, StoreError> {
        self.ensure_online()?;
        Ok(self.collect_entities(|_| true))
    }

    async fn edges_from(&self, entity_id: &str) -> Result<Vec<Edge>, StoreError> {
        self.ensure_online()?;
        Ok(self.collect_edges(|e| e.from_id == entity_id))
    }

    async fn edges_to(&self, entity_id: &str) -> Result<Vec<Edge>, StoreError> {
        self.ensure_online()?;
        Ok(self.collect_edges(|e| e.to_id == entity_id))
    }

    async fn get_edge(&self, key: &EdgeKey) -> Result<Option<Edge>, StoreError> {
        self.ensure_online()?;
        Ok(self.edges.get(key).map(|e| e.value().clone()))
    }

    async fn all_edges(&self) -> Result<Vec<Edge>, StoreError> {
        self.ensure_online()?;
        Ok(self.collect_edges(|_| true))
    }

    async fn upsert_edge(
        &self,
        upsert: &EdgeUpsert,
        step: f64,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, StoreError> {
        self.ensure_online()?;

        let outcome = match self.edges.entry(upsert.key.clone()) {
            Entry::Occupied(mut occupied) => {
                let edge = occupied.get_mut();
                let previous_weight = edge.weight;
                edge.reinforce(upsert, step, now);
                trace!(
                    "Reinforced {} ({:.3} -> {:.3})",
                    upsert.key,
                    previous_weight,
                    edge.weight
                );
                UpsertOutcome::Reinforced {
                    previous_weight,
                    edge: edge.clone(),
                }
            }
            Entry::Vacant(vacant) => {
                let edge = Edge::create(upsert, now);
                trace!("Created {}", upsert.key);
                vacant.insert(edge.clone());
                UpsertOutcome::Created(edge)
            }
        };

        Ok(outcome)
    }

    async fn delete_edge(&self, id: Uuid) -> Result<bool, StoreError> {
        self.ensure_online()?;

        let key = self
            .edges
            .iter()
            .find(|e| e.value().id == id)
            .map(|e| e.key().clone());

        Ok(match key {
            Some(key) => self.edges.remove_if(&key, |_, e| e.id == id).is_some(),
            None => false,
        })
    }

    async fn decay_edges(
        &self,
        factor: f64,
        exempt_since: Option<DateTime<Utc>>,
    ) -> Result<usize, StoreError> {
        self.ensure_online()?;

        let mut decayed = 0;
        for mut entry in self.edges.iter_mut() {
            let edge = entry.value_mut();
            if exempt_since.is_some_and(|cutoff| edge.last_reinforced_at >= cutoff) {
                continue;
            }
            edge.decay(factor);
            decayed += 1;
        }

        debug!("Decayed {} edges by {}", decayed, factor);
        Ok(decayed)
    }

    async fn edges_below_weight(&self, threshold: f64) -> Result<Vec<Edge>, StoreError> {
        self.ensure_online()?;
        Ok(self.collect_edges(|e| !e.is_viable(threshold)))
    }

    async fn last_nightly_run(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.ensure_online()?;
        Ok(*self.last_nightly_run.read())
    }

    async fn record_nightly_run(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.ensure_online()?;
        *self.last_nightly_run.write() = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use synaptic_core::Candidate;

    fn upsert(from: &str, to: &str, confidence: f64) -> EdgeUpsert {
        EdgeUpsert::from_candidate(
            Candidate::builder(from, to, "works_at")
                .confidence(confidence)
                .strategy("pattern")
                .build(),
        )
    }

    #[tokio::test]
    async fn test_upsert_creates_then_reinforces() {
        let store = InMemoryGraphStore::new();
        let now = Utc::now();

        let first = store.upsert_edge(&upsert("p", "o", 0.9), 1.0, now).await.unwrap();
        assert!(first.was_created());
        assert_eq!(first.edge().weight, 1.0);

        let second = store.upsert_edge(&upsert("p", "o", 0.7), 1.0, now).await.unwrap();
        match second {
            UpsertOutcome::Reinforced { previous_weight, edge } => {
                assert_eq!(previous_weight, 1.0);
                assert_eq!(edge.weight, 2.0);
                assert_eq!(edge.confidence, 0.9);
            }
            other => panic!("expected reinforcement, got {:?}", other),
        }
        assert_eq!(store.edge_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_of_one_key() {
        let store = Arc::new(InMemoryGraphStore::new());
        let now = Utc::now();

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.upsert_edge(&upsert("p", "o", 0.8), 1.0, now).await.unwrap()
                })
            })
            .collect();
        let outcomes = futures::future::join_all(tasks).await;

        let created = outcomes
            .into_iter()
            .filter(|o| o.as_ref().unwrap().was_created())
            .count();
        assert_eq!(created, 1);
        assert_eq!(store.edge_count(), 1);

        let edge = store
            .get_edge(&EdgeKey::new("p", "o", "works_at"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edge.weight, 32.0);
        assert_eq!(edge.metadata.reinforcement_count, 31);
    }

    #[tokio::test]
    async fn test_decay_respects_exemption() {
        let store = InMemoryGraphStore::new();
        let now = Utc::now();
        store.insert_edge(
            Edge::new("a", "b", "knows")
                .with_weight(1.0)
                .with_last_reinforced_at(now - chrono::Duration::days(3)),
        );
        store.insert_edge(Edge::new("a", "c", "knows").with_weight(1.0).with_last_reinforced_at(now));

        let decayed = store
            .decay_edges(0.5, Some(now - chrono::Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(decayed, 1);

        let old = store.get_edge(&EdgeKey::new("a", "b", "knows")).await.unwrap().unwrap();
        let fresh = store.get_edge(&EdgeKey::new("a", "c", "knows")).await.unwrap().unwrap();
        assert_eq!(old.weight, 0.5);
        assert_eq!(fresh.weight, 1.0);

        assert_eq!(store.decay_edges(0.5, None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_weak_edges() {
        let store = InMemoryGraphStore::new();
        let weak = Edge::new("a", "b", "knows").with_weight(0.05);
        let weak_id = weak.id;
        store.insert_edge(weak);
        store.insert_edge(Edge::new("a", "c", "knows").with_weight(0.1));

        let below = store.edges_below_weight(0.1).await.unwrap();
        assert_eq!(below.len(), 1);
        assert_eq!(below[0].id, weak_id);

        assert!(store.delete_edge(weak_id).await.unwrap());
        assert!(!store.delete_edge(weak_id).await.unwrap());
        assert_eq!(store.edge_count(), 1);
    }

    #[tokio::test]
    async fn test_entity_queries() {
        let store = InMemoryGraphStore::new();
        let old = Utc::now() - chrono::Duration::days(10);
        store.insert_entity(Entity::new("p-1", "Person", "Ada").with_created_at(old));
        store.insert_entity(Entity::new("o-1", "organization", "Acme").with_source_capture("cap-1"));

        assert_eq!(store.entities_by_type("person").await.unwrap().len(), 1);
        assert_eq!(store.entities_by_source("cap-1").await.unwrap()[0].id, "o-1");

        let recent = store
            .entities_changed_since(Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "o-1");

        let by_ids = store
            .entities_by_ids(&["missing".to_string(), "p-1".to_string()])
            .await
            .unwrap();
        assert_eq!(by_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = InMemoryGraphStore::new();
        store.set_offline(true);

        let err = store.all_edges().await.unwrap_err();
        assert!(err.is_fatal());

        store.set_offline(false);
        assert!(store.all_edges().await.is_ok());
    }
}
