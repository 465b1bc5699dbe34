//! Semantic strategy
//!
//! Asks an LLM for relationships among a batch of entities. Entities are
//! listed under short ids (`e0`, `e1`, ...) and the response is a JSON
//! `relationships` array that is mapped back to real ids.
//!
//! Batches are sent concurrently. LLM failures, timeouts and unparseable
//! responses cost only their batch.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use synaptic_core::{parse_date, Candidate, Entity, GraphView, SemanticConfig};

use crate::{names, DetectionStrategy, SharedBackend, StrategyError};

/// System prompt for relationship discovery
const SEMANTIC_SYSTEM_PROMPT: &str = r#"
You are analyzing entities in a personal knowledge graph to find meaningful connections.

Your task: find ALL meaningful relationships between the listed entities.

Rules:
1. Look for any connection type that makes semantic sense
2. Do not limit yourself to predefined relationship types
3. Name each relationship with a concise snake_case type (e.g. "role_at", "worked_at", "inspired_by", "contradicts")
4. Stay grounded in the evidence: the titles, types and summaries given

For each relationship provide:
- from_entity_id: the short source id ("e0", "e1", ...)
- to_entity_id: the short target id
- relationship_type: snake_case type name
- confidence: 0.0 to 1.0 (how certain you are)
- importance: 0.0 to 1.0 (how significant the connection is)
- description: 1-2 sentences of context
- start_date: YYYY-MM-DD or null
- end_date: YYYY-MM-DD or null

Example input:
  e0: Executive Director at Youth Empowerment Through Arts and Humanities (type: role)
  e1: Youth Empowerment Through Arts and Humanities (type: organization)

Example output:
{"relationships": [{"from_entity_id": "e0", "to_entity_id": "e1", "relationship_type": "role_at", "confidence": 0.95, "importance": 0.85, "description": "Executive Director role at the organization", "start_date": null, "end_date": null}]}

Output ONLY the JSON object, no commentary.
"#;

/// Longest summary included per entity
const MAX_SUMMARY_CHARS: usize = 200;

/// One relationship as returned by the LLM
#[derive(Debug, Deserialize)]
struct RawRelationship {
    from_entity_id: String,
    to_entity_id: String,
    relationship_type: String,
    confidence: f64,
    #[serde(default)]
    importance: Option<f64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
}

/// LLM-backed detector
pub struct SemanticStrategy {
    backend: SharedBackend,
    config: SemanticConfig,
}

impl SemanticStrategy {
    pub fn new(backend: SharedBackend, config: SemanticConfig) -> Self {
        Self { backend, config }
    }

    /// Entity list for the user message, plus the short-id mapping
    fn build_prompt(batch: &[&Entity]) -> (String, HashMap<String, String>) {
        let mut id_map = HashMap::new();
        let mut lines = Vec::with_capacity(batch.len());

        for (i, entity) in batch.iter().enumerate() {
            let short_id = format!("e{}", i);
            let mut line = format!("  {}: {} (type: {})", short_id, entity.title, entity.entity_type);
            if let Some(summary) = entity.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                let summary: String = summary.chars().take(MAX_SUMMARY_CHARS).collect();
                line.push_str(&format!(" - {}", summary));
            }
            lines.push(line);
            id_map.insert(short_id, entity.id.clone());
        }

        (format!("ENTITIES:\n{}", lines.join("\n")), id_map)
    }

    /// Parse one response into candidates
    ///
    /// Individual malformed relationships are dropped; a response that is not
    /// a JSON object with a `relationships` array is a parse error.
    fn parse_response(
        response: &str,
        id_map: &HashMap<String, String>,
        view: &GraphView,
    ) -> Result<Vec<Candidate>, StrategyError> {
        let json = strip_code_fences(response);
        let value: Value =
            serde_json::from_str(json).map_err(|e| StrategyError::Parse(e.to_string()))?;

        let items = value
            .get("relationships")
            .and_then(Value::as_array)
            .ok_or_else(|| StrategyError::Parse("missing 'relationships' array".to_string()))?;

        let mut candidates = Vec::new();
        for item in items {
            let raw: RawRelationship = match serde_json::from_value(item.clone()) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("Skipping malformed relationship: {}", e);
                    continue;
                }
            };

            let (Some(from_id), Some(to_id)) = (
                id_map.get(raw.from_entity_id.trim()),
                id_map.get(raw.to_entity_id.trim()),
            ) else {
                debug!(
                    "Skipping relationship with unknown ids {} -> {}",
                    raw.from_entity_id, raw.to_entity_id
                );
                continue;
            };

            if from_id == to_id {
                continue;
            }
            if !view.in_scope(from_id) && !view.in_scope(to_id) {
                continue;
            }
            if !(0.0..=1.0).contains(&raw.confidence) {
                debug!("Skipping relationship with confidence {}", raw.confidence);
                continue;
            }
            let kind = normalize_kind(&raw.relationship_type);
            if kind.is_empty() {
                continue;
            }

            let mut builder = Candidate::builder(from_id, to_id, &kind)
                .confidence(raw.confidence)
                .dates(
                    raw.start_date.as_deref().and_then(parse_date),
                    raw.end_date.as_deref().and_then(parse_date),
                )
                .evidence("llm_relationship_type", raw.relationship_type.clone())
                .strategy(names::SEMANTIC)
                .source_capture(view.source_capture_id());

            if let Some(importance) = raw.importance.filter(|i| (0.0..=1.0).contains(i)) {
                builder = builder.importance(importance);
            }
            if let Some(description) = raw.description.filter(|d| !d.trim().is_empty()) {
                builder = builder.description(description.trim());
            }

            candidates.push(builder.build());
        }

        Ok(candidates)
    }

    async fn detect_batch(&self, batch: &[&Entity], view: &GraphView) -> Vec<Candidate> {
        let (user, id_map) = Self::build_prompt(batch);
        let timeout = Duration::from_secs(self.config.llm_timeout_secs);

        let response =
            match tokio::time::timeout(timeout, self.backend.generate(SEMANTIC_SYSTEM_PROMPT, &user)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    warn!("Semantic batch failed ({}): {}", self.backend.model_name(), e);
                    return Vec::new();
                }
                Err(_) => {
                    warn!("Semantic batch timed out after {:?}", timeout);
                    return Vec::new();
                }
            };

        match Self::parse_response(&response, &id_map, view) {
            Ok(candidates) => candidates,
            Err(e) => {
                let preview: String = response.chars().take(200).collect();
                warn!("Unparseable semantic response: {} (raw: {})", e, preview);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl DetectionStrategy for SemanticStrategy {
    fn name(&self) -> &str {
        names::SEMANTIC
    }

    async fn detect(&self, view: &GraphView) -> Result<Vec<Candidate>, StrategyError> {
        let entities = view.scope_with_neighbors();
        if entities.len() < 2 {
            debug!("Fewer than 2 entities, skipping semantic strategy");
            return Ok(Vec::new());
        }

        let batches: Vec<&[&Entity]> = entities.chunks(self.config.batch_size).collect();
        if batches.len() > self.config.max_batches {
            warn!(
                "Semantic strategy limited to {} of {} batches",
                self.config.max_batches,
                batches.len()
            );
        }

        // Batches run concurrently, each under its own LLM timeout
        let runs = batches
            .into_iter()
            .take(self.config.max_batches)
            .filter(|batch| batch.len() >= 2)
            .map(|batch| self.detect_batch(batch, view));
        let candidates: Vec<Candidate> = join_all(runs).await.into_iter().flatten().collect();

        info!("Semantic strategy found {} relationships", candidates.len());
        Ok(candidates)
    }
}

/// Remove a surrounding markdown code fence, if present
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let body = match trimmed.find('\n') {
        Some(newline) => &trimmed[newline + 1..],
        None => trimmed.trim_start_matches('`'),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// snake_case relationship type
fn normalize_kind(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
