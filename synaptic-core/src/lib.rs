//! Synaptic Core - Graph domain model for the relationship engine
//!
//! This crate provides the foundational primitives:
//! - Entities and weighted, typed edges with reinforcement and decay
//! - Candidate relations emitted by detection strategies
//! - A read-only graph view shared by strategies within one run
//! - Role/organization pattern extraction
//! - Engine configuration and the confidence filter

pub mod candidate;
pub mod config;
pub mod edge;
pub mod entity;
pub mod filter;
pub mod graph;
pub mod result;
pub mod roles;
pub mod temporal;

pub use candidate::*;
pub use config::*;
pub use edge::*;
pub use entity::*;
pub use filter::*;
pub use graph::*;
pub use result::*;
pub use roles::*;
pub use temporal::*;

/// Weight assigned to a freshly created edge
pub const INITIAL_WEIGHT: f64 = 1.0;

/// Default minimum confidence for a candidate to reach the store
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// Default additive reinforcement step (long-term potentiation)
pub const DEFAULT_REINFORCEMENT_STEP: f64 = 1.0;

/// Default multiplicative decay applied once per nightly cycle
pub const DEFAULT_DECAY_FACTOR: f64 = 0.99;

/// Default weight below which an edge is pruned
pub const DEFAULT_PRUNE_THRESHOLD: f64 = 0.1;

/// Well-known relation kinds emitted by the built-in strategies
pub mod kinds {
    pub const WORKS_AT: &str = "works_at";
    pub const ROLE_AT: &str = "role_at";
    pub const OVERLAPPED_WITH: &str = "overlapped_with";
    pub const INFERRED_CONNECTION: &str = "inferred_connection";
    pub const SEMANTICALLY_RELATED: &str = "semantically_related";
}

/// Well-known entity types the strategies look for
pub mod entity_types {
    pub const PERSON: &str = "person";
    pub const ROLE: &str = "role";
    pub const ORGANIZATION: &str = "organization";
    pub const COMPANY: &str = "company";
}
