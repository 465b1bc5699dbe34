//! Synaptic Detection Strategies
//!
//! Independent detectors that propose candidate relations from a read-only
//! graph view:
//! - Pattern: "<Role> at <Organization>" style affiliations
//! - Semantic: LLM judgment over batches of entities
//! - Temporal: overlapping date ranges
//! - Topology: one-hop transitive inference
//! - Embedding: cosine similarity of entity descriptors

pub mod backend;
pub mod embedding;
pub mod pattern;
pub mod semantic;
pub mod temporal;
pub mod topology;
pub mod traits;

pub use backend::*;
pub use embedding::*;
pub use pattern::*;
pub use semantic::*;
pub use temporal::*;
pub use topology::*;
pub use traits::*;
