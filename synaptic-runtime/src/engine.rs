//! Relationship Engine
//!
//! Drives one run end to end:
//! - Build a read-only view of the run's scope from the store
//! - Run every registered strategy concurrently, each under a timeout
//! - Filter by confidence, coalesce by edge key, reinforce
//! - Nightly only: decay and prune, then advance the watermark

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use synaptic_core::{
    coalesce, entity_types, Candidate, ConfidenceFilter, ConfigError, Edge, EngineConfig, Entity,
    GraphView, RunResult,
};
use synaptic_store::{SharedStore, StoreError};
use synaptic_strategies::{
    DetectionStrategy, EmbeddingStrategy, PatternStrategy, SemanticStrategy, SharedBackend,
    SharedEmbedder, SharedStrategy, TemporalStrategy, TopologyStrategy,
};

use crate::{DecayScheduler, Reinforcer};

/// Errors that stop a run (or prevent the engine from being built)
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Strategy '{0}' is registered more than once")]
    DuplicateStrategy(String),
}

/// Which entry point a run came through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    OnDemand,
    Nightly { full_scan: bool },
    Capture(String),
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::OnDemand => write!(f, "on-demand"),
            RunMode::Nightly { full_scan: true } => write!(f, "nightly (full scan)"),
            RunMode::Nightly { full_scan: false } => write!(f, "nightly (incremental)"),
            RunMode::Capture(id) => write!(f, "capture {}", id),
        }
    }
}

/// Assemble the standard strategy set
///
/// Pattern, temporal and topology always apply; semantic needs an LLM backend
/// and embedding needs an embedder. Toggles in `config` are honored.
pub fn build_strategies(
    config: &EngineConfig,
    backend: Option<SharedBackend>,
    embedder: Option<SharedEmbedder>,
) -> Vec<SharedStrategy> {
    let mut strategies: Vec<SharedStrategy> = vec![
        Arc::new(PatternStrategy::new(&config.pattern)),
        Arc::new(TemporalStrategy::new()),
        Arc::new(TopologyStrategy::new(&config.topology)),
    ];

    if let Some(backend) = backend {
        strategies.push(Arc::new(SemanticStrategy::new(
            backend,
            config.semantic.clone(),
        )));
    }
    if let Some(embedder) = embedder {
        strategies.push(Arc::new(EmbeddingStrategy::new(
            embedder,
            config.embedding.clone(),
        )));
    }

    strategies.retain(|s| config.strategies.is_enabled(s.name()));
    strategies
}

/// The relationship engine
///
/// Stateless across runs: every run reads a fresh view from the store.
pub struct RelationshipEngine {
    config: EngineConfig,
    store: SharedStore,
    strategies: Vec<SharedStrategy>,
    filter: ConfidenceFilter,
}

impl RelationshipEngine {
    /// Validate the configuration and register strategies
    pub fn new(
        config: EngineConfig,
        store: SharedStore,
        strategies: Vec<SharedStrategy>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let mut names = HashSet::new();
        for strategy in &strategies {
            if !names.insert(strategy.name().to_string()) {
                return Err(EngineError::DuplicateStrategy(strategy.name().to_string()));
            }
        }

        let strategies: Vec<SharedStrategy> = strategies
            .into_iter()
            .filter(|s| {
                let enabled = config.strategies.is_enabled(s.name());
                if !enabled {
                    debug!("Strategy {} disabled by configuration", s.name());
                }
                enabled
            })
            .collect();

        info!(
            "Relationship engine ready with {} strategies: {}",
            strategies.len(),
            strategies
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            filter: ConfidenceFilter::new(config.min_confidence),
            config,
            store,
            strategies,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Analyze the given entities (with their neighbourhood as context), or
    /// the whole graph. Never decays or prunes.
    pub async fn run_on_demand(
        &self,
        entity_ids: Option<Vec<String>>,
    ) -> Result<RunResult, EngineError> {
        let started = Instant::now();
        let mode = RunMode::OnDemand;

        let view = match entity_ids {
            Some(ids) => {
                let entities = self.store.entities_by_ids(&ids).await?;
                if entities.len() < ids.len() {
                    warn!(
                        "{} of {} requested entities not found",
                        ids.len() - entities.len(),
                        ids.len()
                    );
                }
                self.scoped_view(entities).await?
            }
            None => self.full_view().await?,
        };

        let mut result = self.detect_and_reinforce(&view, &mode).await?;
        result.processing_time = started.elapsed().as_secs_f64();
        self.log_result(&mode, &result);
        Ok(result)
    }

    /// Nightly consolidation: analyze the full graph or the entities changed
    /// since the last successful nightly run, then decay and prune.
    pub async fn run_nightly(&self, full_scan: bool) -> Result<RunResult, EngineError> {
        let started = Instant::now();
        let started_at = Utc::now();
        let mode = RunMode::Nightly { full_scan };

        let view = if full_scan {
            self.full_view().await?
        } else {
            let since = self.nightly_since(started_at).await?;
            let changed = self.store.entities_changed_since(since).await?;
            info!("{} entities changed since {}", changed.len(), since);
            self.scoped_view(changed).await?
        };

        let mut result = self.detect_and_reinforce(&view, &mode).await?;

        // Decay only starts once every reinforcement write has completed
        let decay = DecayScheduler::new(self.store.clone(), &self.config)
            .run(Utc::now())
            .await?;
        result.edges_decayed = decay.decayed;
        result.edges_pruned = decay.pruned;

        self.store.record_nightly_run(started_at).await?;

        result.processing_time = started.elapsed().as_secs_f64();
        self.log_result(&mode, &result);
        Ok(result)
    }

    /// Incremental run over the entities extracted from one capture
    pub async fn run_for_capture(&self, capture_id: &str) -> Result<RunResult, EngineError> {
        let started = Instant::now();
        let mode = RunMode::Capture(capture_id.to_string());

        let entities = self.store.entities_by_source(capture_id).await?;
        if entities.is_empty() {
            info!("No entities extracted from capture {}", capture_id);
        }
        let view = self
            .scoped_view(entities)
            .await?
            .with_source_capture(capture_id);

        let mut result = self.detect_and_reinforce(&view, &mode).await?;
        result.processing_time = started.elapsed().as_secs_f64();
        self.log_result(&mode, &result);
        Ok(result)
    }

    /// Start of the incremental nightly window
    async fn nightly_since(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, StoreError> {
        Ok(match self.store.last_nightly_run().await? {
            Some(last) => last,
            None => {
                let fallback = now - Duration::hours(self.config.nightly_lookback_hours);
                debug!("No previous nightly run recorded, looking back to {}", fallback);
                fallback
            }
        })
    }

    async fn full_view(&self) -> Result<GraphView, StoreError> {
        let entities = self.store.all_entities().await?;
        let edges = self.store.all_edges().await?;
        Ok(GraphView::full(entities, edges))
    }

    /// View over `scope` plus the context strategies need: direct neighbours,
    /// their outgoing edges, and every organization for pattern matching
    async fn scoped_view(&self, scope: Vec<Entity>) -> Result<GraphView, StoreError> {
        if scope.is_empty() {
            return Ok(GraphView::default());
        }

        let scope_ids: Vec<String> = scope.iter().map(|e| e.id.clone()).collect();
        let mut entities: HashMap<String, Entity> =
            scope.into_iter().map(|e| (e.id.clone(), e)).collect();
        let mut edges: HashMap<Uuid, Edge> = HashMap::new();

        let mut neighbor_ids: Vec<String> = Vec::new();
        for id in &scope_ids {
            for edge in self.store.edges_from(id).await? {
                neighbor_ids.push(edge.to_id.clone());
                edges.insert(edge.id, edge);
            }
            for edge in self.store.edges_to(id).await? {
                neighbor_ids.push(edge.from_id.clone());
                edges.insert(edge.id, edge);
            }
        }
        neighbor_ids.sort();
        neighbor_ids.dedup();
        neighbor_ids.retain(|id| !entities.contains_key(id));

        for neighbor in self.store.entities_by_ids(&neighbor_ids).await? {
            entities.insert(neighbor.id.clone(), neighbor);
        }
        for id in &neighbor_ids {
            for edge in self.store.edges_from(id).await? {
                edges.insert(edge.id, edge);
            }
        }

        for entity_type in [entity_types::ORGANIZATION, entity_types::COMPANY] {
            for org in self.store.entities_by_type(entity_type).await? {
                entities.entry(org.id.clone()).or_insert(org);
            }
        }

        let mut edges: Vec<Edge> = edges.into_values().collect();
        edges.sort_by(|a, b| a.key().cmp(&b.key()));

        Ok(GraphView::new(
            entities.into_values().collect(),
            edges,
            scope_ids,
        ))
    }

    /// Detection, filtering and reinforcement for one view
    async fn detect_and_reinforce(
        &self,
        view: &GraphView,
        mode: &RunMode,
    ) -> Result<RunResult, EngineError> {
        let mut result = RunResult {
            entities_analyzed: view.scope().len(),
            ..Default::default()
        };

        if view.scope().is_empty() {
            debug!("Empty scope for {} run, skipping detection", mode);
            return Ok(result);
        }

        let stats = view.stats();
        info!(
            "Starting {} run: {} entities in scope, {} in view, {} edges",
            mode, stats.scope_size, stats.entity_count, stats.edge_count
        );

        let (candidates, strategies_run) = self.detect(view).await;
        result.strategies_run = strategies_run;
        result.candidates_detected = candidates.len();

        let candidates: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| {
                if c.is_self_loop() {
                    debug!("Dropping self-loop candidate {}", c.key());
                }
                !c.is_self_loop()
            })
            .collect();
        let survivors = self.filter.apply(candidates);
        result.candidates_filtered = result.candidates_detected - survivors.len();
        debug!(
            "{} of {} candidates passed the confidence filter ({})",
            survivors.len(),
            result.candidates_detected,
            self.config.min_confidence
        );

        let upserts = coalesce(survivors);
        let reinforcement = Reinforcer::new(
            self.store.clone(),
            self.config.reinforcement_step,
            self.config.max_edges_per_run,
        )
        .apply(upserts, Utc::now())
        .await?;

        if reinforcement.failed > 0 {
            warn!("{} edge writes failed and were skipped", reinforcement.failed);
        }
        result.edges_created = reinforcement.created;
        result.edges_updated = reinforcement.updated;
        Ok(result)
    }

    /// Run all strategies concurrently; failures contribute nothing
    async fn detect(&self, view: &GraphView) -> (Vec<Candidate>, Vec<String>) {
        let timeout = self.config.strategy_timeout();

        let runs = self.strategies.iter().map(|strategy| async move {
            let started = Instant::now();
            let outcome = tokio::time::timeout(timeout, strategy.detect(view)).await;
            (strategy.name().to_string(), outcome, started.elapsed())
        });

        let mut candidates = Vec::new();
        let mut names = Vec::new();
        for (name, outcome, elapsed) in join_all(runs).await {
            match outcome {
                Ok(Ok(found)) => {
                    info!(
                        "Strategy {} proposed {} candidates in {:.2}s",
                        name,
                        found.len(),
                        elapsed.as_secs_f64()
                    );
                    candidates.extend(found);
                }
                Ok(Err(e)) => error!("Strategy {} failed: {}", name, e),
                Err(_) => error!("Strategy {} timed out after {:?}", name, timeout),
            }
            names.push(name);
        }

        (candidates, names)
    }

    fn log_result(&self, mode: &RunMode, result: &RunResult) {
        info!(
            "Completed {} run in {:.2}s: {} created, {} updated, {} decayed, {} pruned ({} entities analyzed)",
            mode,
            result.processing_time,
            result.edges_created,
            result.edges_updated,
            result.edges_decayed,
            result.edges_pruned,
            result.entities_analyzed
        );
    }
}
