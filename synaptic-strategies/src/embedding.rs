//! Embedding similarity strategy
//!
//! Embeds each entity's descriptor ("title. summary") and proposes a
//! `semantically_related` edge for every sufficiently similar pair.
//! Same-type pairs that are nearly identical are left alone: they are
//! duplicates to merge, not relations to record.

use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use synaptic_core::{kinds, Candidate, EmbeddingConfig, Entity, GraphView};

use crate::{names, DetectionStrategy, StrategyError};

/// Importance assigned to similarity-inferred relations
const EMBEDDING_IMPORTANCE: f64 = 0.6;

/// Embedding collaborator errors
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Expected {expected} embeddings, got {got}")]
    CountMismatch { expected: usize, got: usize },
}

/// Turns texts into vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn model_name(&self) -> &str;
}

/// Thread-safe reference to an embedder
pub type SharedEmbedder = Arc<dyn Embedder>;

/// OpenAI-compatible embeddings endpoint
pub struct OpenAIEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIEmbedder {
    pub fn new(api_key: &str, base_url: Option<&str>, model: &str) -> Result<Self, EmbeddingError> {
        if api_key.is_empty() {
            return Err(EmbeddingError::Config("missing API key".to_string()));
        }

        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = base_url {
            config = config.with_api_base(base_url);
        }

        Ok(Self {
            client: Client::with_config(config),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts.to_vec())
            .build()
            .map_err(|e| EmbeddingError::Api(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EmbeddingError::Api(e.to_string()))?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);

        if data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: data.len(),
            });
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Create a shared OpenAI-compatible embedder
pub fn create_embedder(
    api_key: &str,
    base_url: Option<&str>,
    model: &str,
) -> Result<SharedEmbedder, EmbeddingError> {
    Ok(Arc::new(OpenAIEmbedder::new(api_key, base_url, model)?))
}

/// Cosine similarity; `None` when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Similarity-based detector
pub struct EmbeddingStrategy {
    embedder: SharedEmbedder,
    config: EmbeddingConfig,
}

impl EmbeddingStrategy {
    pub fn new(embedder: SharedEmbedder, config: EmbeddingConfig) -> Self {
        Self { embedder, config }
    }

    fn compare(&self, a: &Entity, b: &Entity, similarity: f64, view: &GraphView) -> Option<Candidate> {
        if similarity < self.config.similarity_threshold {
            return None;
        }
        if a.entity_type.eq_ignore_ascii_case(&b.entity_type)
            && similarity > self.config.duplicate_threshold
        {
            debug!(
                "Skipping likely duplicates {} <-> {} (sim={:.2})",
                a.title, b.title, similarity
            );
            return None;
        }

        let (from, to) = if a.id <= b.id { (a, b) } else { (b, a) };
        Some(
            Candidate::builder(&from.id, &to.id, kinds::SEMANTICALLY_RELATED)
                .confidence(similarity)
                .importance(EMBEDDING_IMPORTANCE)
                .description(format!("Semantically similar (score: {:.2})", similarity))
                .evidence("embedding_similarity", similarity)
                .evidence("embedding_model", self.embedder.model_name())
                .strategy(names::EMBEDDING)
                .source_capture(view.source_capture_id())
                .build(),
        )
    }
}

#[async_trait]
impl DetectionStrategy for EmbeddingStrategy {
    fn name(&self) -> &str {
        names::EMBEDDING
    }

    async fn detect(&self, view: &GraphView) -> Result<Vec<Candidate>, StrategyError> {
        let entities: Vec<&Entity> = view
            .scope_with_neighbors()
            .into_iter()
            .take(self.config.max_entities)
            .collect();

        if entities.len() < 2 {
            debug!("Fewer than 2 entities, skipping embedding similarity");
            return Ok(Vec::new());
        }

        let texts: Vec<String> = entities.iter().map(|e| e.descriptor()).collect();
        let timeout = Duration::from_secs(self.config.timeout_secs);

        let vectors = tokio::time::timeout(timeout, self.embedder.embed(&texts))
            .await
            .map_err(|_| StrategyError::Timeout(timeout))??;

        if vectors.len() != entities.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: entities.len(),
                got: vectors.len(),
            }
            .into());
        }

        let mut candidates = Vec::new();
        for i in 0..entities.len() {
            for j in (i + 1)..entities.len() {
                let (a, b) = (entities[i], entities[j]);
                if !view.in_scope(&a.id) && !view.in_scope(&b.id) {
                    continue;
                }
                let Some(similarity) = cosine_similarity(&vectors[i], &vectors[j]) else {
                    continue;
                };
                if let Some(candidate) = self.compare(a, b, similarity, view) {
                    candidates.push(candidate);
                }
            }
        }

        info!("Embedding strategy found {} connections", candidates.len());
        Ok(candidates)
    }
}
