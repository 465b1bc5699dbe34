//! Graph View - the read-only snapshot strategies run against
//!
//! A view is built once per run from the store and shared by every strategy:
//! - Entities in scope plus the context the strategies need
//! - Edges indexed by source and by key
//! - The run's scope (which entities are being analyzed)

use std::collections::{HashMap, HashSet};

use crate::{Edge, EdgeKey, Entity};

/// Immutable snapshot of the part of the graph a run looks at
#[derive(Debug, Clone, Default)]
pub struct GraphView {
    /// Entities by id (scope and context)
    entities: HashMap<String, Entity>,

    /// All edges in the snapshot
    edges: Vec<Edge>,

    /// Outgoing edge indices by source entity
    outgoing: HashMap<String, Vec<usize>>,

    /// Edge keys for existence checks
    keys: HashSet<EdgeKey>,

    /// Entity ids under analysis, in stable order
    scope: Vec<String>,

    /// Capture the run was triggered by, when scoped to one
    source_capture_id: Option<String>,
}

impl GraphView {
    /// Build a view; scope ids not present in `entities` are dropped
    pub fn new(entities: Vec<Entity>, edges: Vec<Edge>, scope: Vec<String>) -> Self {
        let entities: HashMap<String, Entity> =
            entities.into_iter().map(|e| (e.id.clone(), e)).collect();

        let mut seen = HashSet::new();
        let scope = scope
            .into_iter()
            .filter(|id| entities.contains_key(id) && seen.insert(id.clone()))
            .collect();

        let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
        let mut keys = HashSet::new();
        for (idx, edge) in edges.iter().enumerate() {
            outgoing.entry(edge.from_id.clone()).or_default().push(idx);
            keys.insert(edge.key());
        }

        Self {
            entities,
            edges,
            outgoing,
            keys,
            scope,
            source_capture_id: None,
        }
    }

    /// A view whose scope is every entity it holds
    pub fn full(entities: Vec<Entity>, edges: Vec<Edge>) -> Self {
        let mut scope: Vec<String> = entities.iter().map(|e| e.id.clone()).collect();
        scope.sort();
        Self::new(entities, edges, scope)
    }

    pub fn with_source_capture(mut self, capture_id: &str) -> Self {
        self.source_capture_id = Some(capture_id.to_string());
        self
    }

    pub fn source_capture_id(&self) -> Option<&str> {
        self.source_capture_id.as_deref()
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Entities of any of the given types (case-insensitive)
    pub fn entities_of_type(&self, types: &[&str]) -> Vec<&Entity> {
        let mut found: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| types.iter().any(|t| e.is_type(t)))
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    pub fn in_scope(&self, id: &str) -> bool {
        self.scope.iter().any(|s| s == id)
    }

    /// Entities under analysis, in scope order
    pub fn scope_entities(&self) -> Vec<&Entity> {
        self.scope.iter().filter_map(|id| self.entities.get(id)).collect()
    }

    /// Scope entities followed by their directly connected context entities
    pub fn scope_with_neighbors(&self) -> Vec<&Entity> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut result = Vec::new();

        for entity in self.scope_entities() {
            if seen.insert(entity.id.as_str()) {
                result.push(entity);
            }
        }
        for id in &self.scope {
            for neighbor in self.neighbors(id) {
                if seen.insert(neighbor.id.as_str()) {
                    result.push(neighbor);
                }
            }
        }

        result
    }

    /// Entities one hop away in either direction
    pub fn neighbors(&self, id: &str) -> Vec<&Entity> {
        let mut ids: Vec<&str> = self
            .edges
            .iter()
            .filter_map(|e| {
                if e.from_id == id {
                    Some(e.to_id.as_str())
                } else if e.to_id == id {
                    Some(e.from_id.as_str())
                } else {
                    None
                }
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter().filter_map(|n| self.entities.get(n)).collect()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges leaving `id`
    pub fn outgoing(&self, id: &str) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.edges[idx])
    }

    pub fn has_edge(&self, from_id: &str, to_id: &str, kind: &str) -> bool {
        self.keys.contains(&EdgeKey::new(from_id, to_id, kind))
    }

    /// Whether any edge of any kind runs `from_id -> to_id`
    pub fn has_any_edge(&self, from_id: &str, to_id: &str) -> bool {
        self.outgoing(from_id).any(|e| e.to_id == to_id)
    }

    pub fn stats(&self) -> GraphStats {
        let total_weight: f64 = self.edges.iter().map(|e| e.weight).sum();
        GraphStats {
            entity_count: self.entities.len(),
            edge_count: self.edges.len(),
            scope_size: self.scope.len(),
            avg_weight: if self.edges.is_empty() {
                0.0
            } else {
                total_weight / self.edges.len() as f64
            },
        }
    }
}

/// Snapshot statistics
#[derive(Debug, Clone)]
pub struct GraphStats {
    pub entity_count: usize,
    pub edge_count: usize,
    pub scope_size: usize,
    pub avg_weight: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GraphView {
        let entities = vec![
            Entity::new("a", "person", "Ada"),
            Entity::new("b", "organization", "Acme"),
            Entity::new("c", "project", "Rocket"),
            Entity::new("d", "person", "Grace"),
        ];
        let edges = vec![
            Edge::new("a", "b", "works_at"),
            Edge::new("b", "c", "owns"),
            Edge::new("d", "a", "knows"),
        ];
        GraphView::new(entities, edges, vec!["a".into(), "missing".into(), "a".into()])
    }

    #[test]
    fn test_scope_drops_unknown_and_duplicates() {
        let view = sample();
        assert_eq!(view.scope(), &["a".to_string()]);
        assert!(view.in_scope("a"));
        assert!(!view.in_scope("b"));
    }

    #[test]
    fn test_neighbors_both_directions() {
        let view = sample();
        let ids: Vec<_> = view.neighbors("a").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d"]);

        let context: Vec<_> = view.scope_with_neighbors().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(context, vec!["a", "b", "d"]);
    }

    #[test]
    fn test_edge_lookup() {
        let view = sample();
        assert!(view.has_edge("a", "b", "works_at"));
        assert!(!view.has_edge("a", "b", "owns"));
        assert!(view.has_any_edge("b", "c"));
        assert!(!view.has_any_edge("c", "b"));
        assert_eq!(view.outgoing("b").count(), 1);
        assert_eq!(view.outgoing("c").count(), 0);
    }

    #[test]
    fn test_full_view_scopes_everything() {
        let view = GraphView::full(
            vec![Entity::new("x", "person", "X"), Entity::new("y", "person", "Y")],
            Vec::new(),
        );
        assert_eq!(view.stats().scope_size, 2);
        assert_eq!(view.entities_of_type(&["PERSON"]).len(), 2);
    }
}
