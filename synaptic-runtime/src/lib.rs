//! Synaptic Runtime
//!
//! Runs the relationship engine over a graph store:
//! - Strategies detect candidates concurrently over one read-only view
//! - Surviving candidates reinforce edges (Hebbian strengthening)
//! - Nightly runs decay every edge and prune the weak ones

pub mod decay;
pub mod engine;
pub mod reinforcement;
pub mod response;

pub use decay::*;
pub use engine::*;
pub use reinforcement::*;
pub use response::*;
