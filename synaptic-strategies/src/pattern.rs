//! Pattern strategy
//!
//! Deterministic detection of role affiliations:
//! - Person with role text "CTO at Acme" -> `works_at` to the Acme organization
//! - Role entity titled "Director of Academics, Caliber Schools" -> `role_at`
//!
//! Organizations and companies in the view are the match targets.

use async_trait::async_trait;
use tracing::{debug, info};

use synaptic_core::{
    entity_types, kinds, organization_matches, parse_role_affiliation, role_texts, Candidate,
    Entity, GraphView, PatternConfig,
};

use crate::{names, DetectionStrategy, StrategyError};

/// Role/organization pattern detector
pub struct PatternStrategy {
    confidence: f64,
}

impl PatternStrategy {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            confidence: config.confidence,
        }
    }

    /// Edge kind for an entity that carries role text, if any
    fn affiliation_kind(entity: &Entity) -> Option<&'static str> {
        if entity.is_type(entity_types::PERSON) {
            Some(kinds::WORKS_AT)
        } else if entity.is_type(entity_types::ROLE) {
            Some(kinds::ROLE_AT)
        } else {
            None
        }
    }

    fn detect_entity(
        &self,
        entity: &Entity,
        kind: &str,
        organizations: &[&Entity],
        view: &GraphView,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for text in role_texts(entity) {
            let Some(affiliation) = parse_role_affiliation(&text) else {
                continue;
            };

            for org in organizations.iter().filter(|o| o.id != entity.id) {
                if !organization_matches(&affiliation.organization, &org.title) {
                    continue;
                }
                debug!("{} '{}' matches {}", entity.id, text, org.title);

                candidates.push(
                    Candidate::builder(&entity.id, &org.id, kind)
                        .confidence(self.confidence)
                        .description(affiliation.role.clone())
                        .evidence("pattern", affiliation.form.as_str())
                        .evidence("matched_text", text.clone())
                        .strategy(names::PATTERN)
                        .source_capture(view.source_capture_id())
                        .build(),
                );
            }
        }

        candidates
    }
}

impl Default for PatternStrategy {
    fn default() -> Self {
        Self::new(&PatternConfig::default())
    }
}

#[async_trait]
impl DetectionStrategy for PatternStrategy {
    fn name(&self) -> &str {
        names::PATTERN
    }

    async fn detect(&self, view: &GraphView) -> Result<Vec<Candidate>, StrategyError> {
        let organizations =
            view.entities_of_type(&[entity_types::ORGANIZATION, entity_types::COMPANY]);
        if organizations.is_empty() {
            debug!("No organizations in view, skipping pattern strategy");
            return Ok(Vec::new());
        }

        let candidates: Vec<Candidate> = view
            .scope_entities()
            .into_iter()
            .filter_map(|entity| Self::affiliation_kind(entity).map(|kind| (entity, kind)))
            .flat_map(|(entity, kind)| self.detect_entity(entity, kind, &organizations, view))
            .collect();

        info!("Pattern strategy found {} relationships", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(entities: Vec<Entity>) -> GraphView {
        GraphView::full(entities, Vec::new())
    }

    #[tokio::test]
    async fn test_person_works_at() {
        let view = view(vec![
            Entity::new("p-1", "person", "Ada").with_metadata("role", "CTO at Acme"),
            Entity::new("o-1", "organization", "Acme"),
            Entity::new("o-2", "organization", "Globex"),
        ]);

        let candidates = PatternStrategy::default().detect(&view).await.unwrap();
        assert_eq!(candidates.len(), 1);

        let c = &candidates[0];
        assert_eq!((c.from_id.as_str(), c.to_id.as_str()), ("p-1", "o-1"));
        assert_eq!(c.kind, kinds::WORKS_AT);
        assert_eq!(c.confidence, 0.9);
        assert_eq!(c.description.as_deref(), Some("CTO"));
        assert_eq!(c.strategy, names::PATTERN);
    }

    #[tokio::test]
    async fn test_role_entity_comma_form() {
        let view = view(vec![
            Entity::new("r-1", "role", "Director of Academics, Caliber Schools"),
            Entity::new("o-1", "company", "Caliber Schools Inc"),
        ]);

        let candidates = PatternStrategy::default().detect(&view).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, kinds::ROLE_AT);
        assert_eq!(candidates[0].evidence["pattern"], "role_comma_organization");
        assert_eq!(candidates[0].description.as_deref(), Some("Director of Academics"));
    }

    #[tokio::test]
    async fn test_no_matching_organization() {
        let view = view(vec![
            Entity::new("p-1", "person", "Ada").with_metadata("role", "CTO at Initech"),
            Entity::new("o-1", "organization", "Acme"),
        ]);
        assert!(PatternStrategy::default().detect(&view).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_roles_independent() {
        let view = view(vec![
            Entity::new("p-1", "person", "Ada")
                .with_metadata("role", "CTO at Acme; Advisor, Globex"),
            Entity::new("o-1", "organization", "Acme"),
            Entity::new("o-2", "organization", "Globex"),
        ]);

        let candidates = PatternStrategy::default().detect(&view).await.unwrap();
        let targets: Vec<_> = candidates.iter().map(|c| c.to_id.as_str()).collect();
        assert_eq!(targets, vec!["o-1", "o-2"]);
    }

    #[tokio::test]
    async fn test_only_scope_is_scanned() {
        let entities = vec![
            Entity::new("p-1", "person", "Ada").with_metadata("role", "CTO at Acme"),
            Entity::new("p-2", "person", "Grace").with_metadata("role", "Engineer at Acme"),
            Entity::new("o-1", "organization", "Acme"),
        ];
        let view = GraphView::new(entities, Vec::new(), vec!["p-2".to_string()]);

        let candidates = PatternStrategy::new(&PatternConfig { confidence: 0.8 })
            .detect(&view)
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].from_id, "p-2");
        assert_eq!(candidates[0].confidence, 0.8);
    }
}
