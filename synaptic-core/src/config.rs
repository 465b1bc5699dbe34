//! Engine configuration
//!
//! Every field has a default, so a TOML file only needs the values it
//! overrides. `validate()` must pass before any strategy runs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::{
    DEFAULT_DECAY_FACTOR, DEFAULT_MIN_CONFIDENCE, DEFAULT_PRUNE_THRESHOLD,
    DEFAULT_REINFORCEMENT_STEP,
};

/// Invalid or unreadable configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Longest grace window or lookback accepted, about ten years
pub const MAX_WINDOW_HOURS: i64 = 10 * 366 * 24;

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Candidates below this never reach the store
    pub min_confidence: f64,
    /// Additive weight increase on re-detection
    pub reinforcement_step: f64,
    /// Nightly multiplicative decay, in (0, 1)
    pub decay_factor: f64,
    /// Edges whose decayed weight is below this are deleted
    pub prune_threshold: f64,
    /// Edges reinforced this recently skip the decay pass (0 disables)
    pub decay_grace_window_secs: u64,
    /// Safety cap on edge writes per run
    pub max_edges_per_run: usize,
    /// Wall-clock cap on each strategy
    pub strategy_timeout_secs: u64,
    /// Incremental nightly window when no previous run is recorded
    pub nightly_lookback_hours: i64,

    pub strategies: StrategyToggles,
    pub pattern: PatternConfig,
    pub semantic: SemanticConfig,
    pub topology: TopologyConfig,
    pub embedding: EmbeddingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            reinforcement_step: DEFAULT_REINFORCEMENT_STEP,
            decay_factor: DEFAULT_DECAY_FACTOR,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            decay_grace_window_secs: 0,
            max_edges_per_run: 10_000,
            strategy_timeout_secs: 120,
            nightly_lookback_hours: 24,
            strategies: StrategyToggles::default(),
            pattern: PatternConfig::default(),
            semantic: SemanticConfig::default(),
            topology: TopologyConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

/// Which strategies are registered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyToggles {
    pub pattern: bool,
    pub semantic: bool,
    pub temporal: bool,
    pub topology: bool,
    pub embedding: bool,
}

impl Default for StrategyToggles {
    fn default() -> Self {
        Self {
            pattern: true,
            semantic: true,
            temporal: true,
            topology: true,
            embedding: true,
        }
    }
}

impl StrategyToggles {
    /// Whether the named strategy may run; unknown names are always enabled
    pub fn is_enabled(&self, name: &str) -> bool {
        match name {
            "pattern" => self.pattern,
            "semantic" => self.semantic,
            "temporal" => self.temporal,
            "topology" => self.topology,
            "embedding" => self.embedding,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub confidence: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self { confidence: 0.9 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Entities per LLM prompt
    pub batch_size: usize,
    /// Prompts per run
    pub max_batches: usize,
    /// Cap on each LLM call
    pub llm_timeout_secs: u64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_batches: 10,
            llm_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Kinds that may be chained; empty means every kind
    pub transitive_kinds: Vec<String>,
    pub confidence: f64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            transitive_kinds: Vec::new(),
            confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Minimum cosine similarity to propose an edge
    pub similarity_threshold: f64,
    /// Same-type pairs above this are treated as duplicates, not relations
    pub duplicate_threshold: f64,
    /// Entities embedded per run
    pub max_entities: usize,
    /// Cap on each embedding call
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            duplicate_threshold: 0.95,
            max_entities: 200,
            timeout_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("min_confidence", self.min_confidence)?;
        unit_interval("pattern.confidence", self.pattern.confidence)?;
        unit_interval("topology.confidence", self.topology.confidence)?;
        unit_interval("embedding.similarity_threshold", self.embedding.similarity_threshold)?;
        unit_interval("embedding.duplicate_threshold", self.embedding.duplicate_threshold)?;

        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(invalid(
                "decay_factor",
                format!("{} is not in the open interval (0, 1)", self.decay_factor),
            ));
        }
        if !self.prune_threshold.is_finite() || self.prune_threshold < 0.0 {
            return Err(invalid(
                "prune_threshold",
                format!("{} must be a finite, non-negative weight", self.prune_threshold),
            ));
        }
        if !self.reinforcement_step.is_finite() || self.reinforcement_step <= 0.0 {
            return Err(invalid(
                "reinforcement_step",
                format!("{} must be positive", self.reinforcement_step),
            ));
        }
        if self.strategy_timeout_secs == 0 {
            return Err(invalid("strategy_timeout_secs", "must be at least 1"));
        }
        if self.semantic.llm_timeout_secs == 0 {
            return Err(invalid("semantic.llm_timeout_secs", "must be at least 1"));
        }
        if self.embedding.timeout_secs == 0 {
            return Err(invalid("embedding.timeout_secs", "must be at least 1"));
        }
        if self.semantic.batch_size < 2 {
            return Err(invalid("semantic.batch_size", "must hold at least 2 entities"));
        }
        if self.max_edges_per_run == 0 {
            return Err(invalid("max_edges_per_run", "must be at least 1"));
        }
        if self.nightly_lookback_hours <= 0 || self.nightly_lookback_hours > MAX_WINDOW_HOURS {
            return Err(invalid(
                "nightly_lookback_hours",
                format!("must be between 1 and {}", MAX_WINDOW_HOURS),
            ));
        }
        if self.decay_grace_window_secs > (MAX_WINDOW_HOURS * 3600) as u64 {
            return Err(invalid(
                "decay_grace_window_secs",
                format!("must be at most {} hours", MAX_WINDOW_HOURS),
            ));
        }
        if self.strategy_timeout_secs < self.semantic.llm_timeout_secs {
            return Err(invalid(
                "strategy_timeout_secs",
                format!(
                    "must not be shorter than semantic.llm_timeout_secs ({})",
                    self.semantic.llm_timeout_secs
                ),
            ));
        }
        Ok(())
    }

    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_secs(self.strategy_timeout_secs)
    }

    /// Grace window before decay, if enabled
    pub fn decay_grace_window(&self) -> Option<chrono::Duration> {
        (self.decay_grace_window_secs > 0)
            .then(|| chrono::Duration::seconds(self.decay_grace_window_secs as i64))
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("{} is not in [0, 1]", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_confidence, 0.5);
        assert_eq!(config.decay_factor, 0.99);
        assert_eq!(config.prune_threshold, 0.1);
        assert!(config.decay_grace_window().is_none());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            decay_factor = 0.9
            decay_grace_window_secs = 3600

            [topology]
            transitive_kinds = ["works_at", "part_of"]

            [strategies]
            semantic = false
            "#,
        )
        .unwrap();

        assert_eq!(config.decay_factor, 0.9);
        assert_eq!(config.min_confidence, 0.5);
        assert_eq!(config.topology.transitive_kinds.len(), 2);
        assert!(!config.strategies.is_enabled("semantic"));
        assert!(config.strategies.is_enabled("pattern"));
        assert!(config.strategies.is_enabled("custom"));
        assert_eq!(config.decay_grace_window(), Some(chrono::Duration::hours(1)));
    }

    #[test]
    fn test_rejects_bad_decay_factor() {
        for factor in [0.0, 1.0, 1.5, -0.2, f64::NAN] {
            let config = EngineConfig {
                decay_factor: factor,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid { field: "decay_factor", .. })),
                "factor {} should be rejected",
                factor
            );
        }
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        let config = EngineConfig {
            min_confidence: 1.2,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            prune_threshold: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            reinforcement_step: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unbounded_windows() {
        let config = EngineConfig {
            decay_grace_window_secs: 10_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "decay_grace_window_secs", .. })
        ));

        let config = EngineConfig {
            nightly_lookback_hours: i64::MAX / 2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "nightly_lookback_hours", .. })
        ));

        let config = EngineConfig {
            decay_grace_window_secs: (MAX_WINDOW_HOURS * 3600) as u64,
            nightly_lookback_hours: MAX_WINDOW_HOURS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strategy_timeout_covers_llm_call() {
        let mut config = EngineConfig::default();
        config.strategy_timeout_secs = 30;
        config.semantic.llm_timeout_secs = 60;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "strategy_timeout_secs", .. })
        ));

        config.strategy_timeout_secs = 60;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "min_confidence = 0.7\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.min_confidence, 0.7);

        std::fs::write(&path, "min_confidence = \"high\"\n").unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
