//! Knowledge-graph entities
//!
//! Entities are produced by the upstream extraction layer and are read-only
//! from the engine's point of view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::DateRange;

/// A node in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable entity identifier
    pub id: String,

    /// Entity type (person, organization, project, decision, ...)
    #[serde(rename = "type")]
    pub entity_type: String,

    /// Display title
    pub title: String,

    /// Optional longer summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Free-form metadata from extraction
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp, when the extractor revised the entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Capture the entity was extracted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_capture_id: Option<String>,
}

impl Entity {
    pub fn new(id: &str, entity_type: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            entity_type: entity_type.to_string(),
            title: title.to_string(),
            summary: None,
            metadata: Map::new(),
            created_at: Utc::now(),
            updated_at: None,
            source_capture_id: None,
        }
    }

    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_source_capture(mut self, capture_id: &str) -> Self {
        self.source_capture_id = Some(capture_id.to_string());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Case-insensitive type check
    pub fn is_type(&self, entity_type: &str) -> bool {
        self.entity_type.eq_ignore_ascii_case(entity_type)
    }

    /// String metadata value, if present and non-empty
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Most recent of creation and update time
    pub fn last_changed_at(&self) -> DateTime<Utc> {
        match self.updated_at {
            Some(updated) if updated > self.created_at => updated,
            _ => self.created_at,
        }
    }

    /// Date range carried in `start_date`/`end_date` metadata
    pub fn date_range(&self) -> Option<DateRange> {
        DateRange::parse(self.metadata_str("start_date"), self.metadata_str("end_date"))
    }

    /// Text used for embeddings and prompts: "title. summary"
    pub fn descriptor(&self) -> String {
        match self.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(summary) => format!("{}. {}", self.title, summary),
            None => self.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_accessors() {
        let entity = Entity::new("p-1", "Person", "Ada")
            .with_metadata("role", "CTO at Acme")
            .with_metadata("blank", "   ");

        assert!(entity.is_type("person"));
        assert_eq!(entity.metadata_str("role"), Some("CTO at Acme"));
        assert_eq!(entity.metadata_str("blank"), None);
        assert_eq!(entity.metadata_str("missing"), None);
    }

    #[test]
    fn test_last_changed_prefers_update() {
        let mut entity = Entity::new("p-1", "person", "Ada");
        let later = entity.created_at + chrono::Duration::hours(3);
        entity.updated_at = Some(later);
        assert_eq!(entity.last_changed_at(), later);
    }

    #[test]
    fn test_descriptor() {
        let plain = Entity::new("o-1", "organization", "Acme");
        assert_eq!(plain.descriptor(), "Acme");

        let rich = plain.with_summary("Rocket maker");
        assert_eq!(rich.descriptor(), "Acme. Rocket maker");
    }

    #[test]
    fn test_deserialize_with_type_field() {
        let json = r#"{
            "id": "o-1",
            "type": "company",
            "title": "Acme",
            "created_at": "2024-01-01T00:00:00Z"
        }"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert!(entity.is_type("company"));
        assert!(entity.metadata.is_empty());
    }
}
