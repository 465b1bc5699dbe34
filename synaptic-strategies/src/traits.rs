//! Common interface for detection strategies

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use synaptic_core::{Candidate, GraphView};

use crate::{EmbeddingError, LlmError};

/// Strategy names, as recorded in edge provenance and run results
pub mod names {
    pub const PATTERN: &str = "pattern";
    pub const SEMANTIC: &str = "semantic";
    pub const TEMPORAL: &str = "temporal";
    pub const TOPOLOGY: &str = "topology";
    pub const EMBEDDING: &str = "embedding";
}

/// Errors from strategy execution
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Strategy failed: {0}")]
    Failed(String),
}

/// A detector that proposes candidate relations
///
/// `detect` reads only the view; it never writes to the store.
#[async_trait]
pub trait DetectionStrategy: Send + Sync {
    /// Stable strategy name
    fn name(&self) -> &str;

    /// Propose candidates for the view's scope
    async fn detect(&self, view: &GraphView) -> Result<Vec<Candidate>, StrategyError>;
}

/// Thread-safe reference to a strategy
pub type SharedStrategy = Arc<dyn DetectionStrategy>;
