//! Graph store interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use synaptic_core::{Edge, EdgeKey, EdgeUpsert, Entity};

/// Errors from the graph store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached at all; fatal for a run
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A single write failed; the caller may skip it and continue
    #[error("Write failed: {0}")]
    Write(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the whole run must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Io(_))
    }
}

/// Result of an atomic keyed upsert
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// No edge existed for the key; one was created with weight 1.0
    Created(Edge),
    /// The existing edge was reinforced
    Reinforced { previous_weight: f64, edge: Edge },
}

impl UpsertOutcome {
    pub fn edge(&self) -> &Edge {
        match self {
            UpsertOutcome::Created(edge) => edge,
            UpsertOutcome::Reinforced { edge, .. } => edge,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

/// Persistence collaborator of the relationship engine
///
/// Implementations must make `upsert_edge` atomic per edge key: concurrent
/// upserts of one key from any number of runs or processes create at most
/// one edge and apply every reinforcement exactly once.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Entity by id
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>, StoreError>;

    /// Entities by id; unknown ids are skipped
    async fn entities_by_ids(&self, ids: &[String]) -> Result<Vec<Entity>, StoreError>;

    /// Entities of a type (case-insensitive)
    async fn entities_by_type(&self, entity_type: &str) -> Result<Vec<Entity>, StoreError>;

    /// Entities extracted from one capture
    async fn entities_by_source(&self, capture_id: &str) -> Result<Vec<Entity>, StoreError>;

    /// Entities created or updated strictly after `since`
    async fn entities_changed_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Entity>, StoreError>;

    async fn all_entities(&self) -> Result<Vec<Entity>, StoreError>;

    /// Edges leaving an entity
    async fn edges_from(&self, entity_id: &str) -> Result<Vec<Edge>, StoreError>;

    /// Edges entering an entity
    async fn edges_to(&self, entity_id: &str) -> Result<Vec<Edge>, StoreError>;

    async fn get_edge(&self, key: &EdgeKey) -> Result<Option<Edge>, StoreError>;

    async fn all_edges(&self) -> Result<Vec<Edge>, StoreError>;

    /// Create the edge for `upsert.key`, or reinforce it by `step`
    async fn upsert_edge(
        &self,
        upsert: &EdgeUpsert,
        step: f64,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Delete by id; `false` when nothing matched
    async fn delete_edge(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Multiply every edge weight by `factor`, skipping edges reinforced at or
    /// after `exempt_since`. Returns the number of edges decayed.
    async fn decay_edges(
        &self,
        factor: f64,
        exempt_since: Option<DateTime<Utc>>,
    ) -> Result<usize, StoreError>;

    /// Edges with weight strictly below `threshold`
    async fn edges_below_weight(&self, threshold: f64) -> Result<Vec<Edge>, StoreError>;

    /// Start time of the last successful nightly run
    async fn last_nightly_run(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn record_nightly_run(&self, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Thread-safe reference to a graph store
pub type SharedStore = Arc<dyn GraphStore>;
