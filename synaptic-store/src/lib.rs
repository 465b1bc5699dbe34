//! Synaptic Store Layer
//!
//! The engine's only view of persistence:
//! - `GraphStore` trait: entity reads, edge reads, atomic keyed upsert,
//!   delete, bulk decay and the nightly watermark
//! - In-memory backend with entry-level locking per edge key
//! - JSON snapshot load/save for file-backed graphs

pub mod memory;
pub mod snapshot;
pub mod store;

pub use memory::*;
pub use snapshot::*;
pub use store::*;
