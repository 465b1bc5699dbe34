//! Temporal strategy
//!
//! Two entities whose date ranges overlap get an `overlapped_with` edge.
//! An entity's ranges come from its own `start_date`/`end_date` metadata and
//! from the dated edges it originates (e.g. a `works_at` edge for 2019-2021).

use async_trait::async_trait;
use tracing::{debug, info};

use synaptic_core::{kinds, Candidate, DateRange, Entity, GraphView, Overlap};

use crate::{names, DetectionStrategy, StrategyError};

const TEMPORAL_IMPORTANCE: f64 = 0.5;

/// Confidence by overlap length; open-ended overlaps count as long
pub fn overlap_confidence(overlap: &Overlap) -> f64 {
    match overlap.days() {
        Some(days) if days > 365 => 0.8,
        Some(days) if days > 90 => 0.7,
        Some(_) => 0.6,
        None => 0.8,
    }
}

/// Date-overlap detector
#[derive(Debug, Default)]
pub struct TemporalStrategy;

impl TemporalStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Every dated range attached to an entity
    fn ranges(entity: &Entity, view: &GraphView) -> Vec<DateRange> {
        let mut ranges: Vec<DateRange> = entity.date_range().into_iter().collect();
        for range in view.outgoing(&entity.id).filter_map(|e| e.date_range()) {
            if !ranges.contains(&range) {
                ranges.push(range);
            }
        }
        ranges
    }

    /// Longest overlap between any range of `a` and any range of `b`
    fn best_overlap(a: &[DateRange], b: &[DateRange]) -> Option<Overlap> {
        a.iter()
            .flat_map(|ra| b.iter().filter_map(move |rb| ra.overlap(rb)))
            .max_by_key(|o| o.days().unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl DetectionStrategy for TemporalStrategy {
    fn name(&self) -> &str {
        names::TEMPORAL
    }

    async fn detect(&self, view: &GraphView) -> Result<Vec<Candidate>, StrategyError> {
        let mut dated: Vec<(&Entity, Vec<DateRange>)> = view
            .entities()
            .map(|e| (e, Self::ranges(e, view)))
            .filter(|(_, ranges)| !ranges.is_empty())
            .collect();
        dated.sort_by(|a, b| a.0.id.cmp(&b.0.id));

        if dated.len() < 2 {
            debug!("Only {} dated entities, skipping temporal strategy", dated.len());
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for i in 0..dated.len() {
            for j in (i + 1)..dated.len() {
                let (a, a_ranges) = &dated[i];
                let (b, b_ranges) = &dated[j];
                if !view.in_scope(&a.id) && !view.in_scope(&b.id) {
                    continue;
                }

                let Some(overlap) = Self::best_overlap(a_ranges, b_ranges) else {
                    continue;
                };

                let mut builder = Candidate::builder(&a.id, &b.id, kinds::OVERLAPPED_WITH)
                    .confidence(overlap_confidence(&overlap))
                    .importance(TEMPORAL_IMPORTANCE)
                    .description(format!("Co-occurred during {}", overlap.describe()))
                    .dates(overlap.start, overlap.end)
                    .strategy(names::TEMPORAL)
                    .source_capture(view.source_capture_id());
                if let Some(days) = overlap.days() {
                    builder = builder.evidence("overlap_days", days);
                }
                candidates.push(builder.build());
            }
        }

        info!("Temporal strategy found {} connections", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use synaptic_core::Edge;

    fn dated(id: &str, start: &str, end: Option<&str>) -> Entity {
        let mut entity = Entity::new(id, "project", id).with_metadata("start_date", start);
        if let Some(end) = end {
            entity = entity.with_metadata("end_date", end);
        }
        entity
    }

    #[tokio::test]
    async fn test_overlap_confidence_tiers() {
        let view = GraphView::full(
            vec![
                dated("a", "2019-01-01", Some("2021-12-31")),
                dated("b", "2021-01-01", Some("2022-06-30")),
                dated("c", "2021-11-01", Some("2021-11-30")),
                dated("d", "2023-01-01", Some("2023-12-31")),
            ],
            Vec::new(),
        );

        let candidates = TemporalStrategy::new().detect(&view).await.unwrap();
        let found: Vec<_> = candidates
            .iter()
            .map(|c| (c.from_id.as_str(), c.to_id.as_str(), c.confidence))
            .collect();

        assert_eq!(found, vec![("a", "b", 0.7), ("a", "c", 0.6), ("b", "c", 0.6)]);

        let ab = &candidates[0];
        assert_eq!(ab.kind, kinds::OVERLAPPED_WITH);
        assert_eq!(ab.start_date, NaiveDate::from_ymd_opt(2021, 1, 1));
        assert_eq!(ab.end_date, NaiveDate::from_ymd_opt(2021, 12, 31));
        assert_eq!(
            ab.description.as_deref(),
            Some("Co-occurred during 2021-01-01 to 2021-12-31")
        );
    }

    #[tokio::test]
    async fn test_touching_ranges_overlap() {
        let view = GraphView::full(
            vec![
                dated("a", "2020-01-01", Some("2020-06-01")),
                dated("b", "2020-06-01", Some("2020-12-31")),
            ],
            Vec::new(),
        );
        let candidates = TemporalStrategy::new().detect(&view).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].evidence["overlap_days"], 0);
    }

    #[tokio::test]
    async fn test_open_ended_and_undated() {
        let view = GraphView::full(
            vec![
                dated("a", "2015", None),
                dated("b", "2020-03", None),
                Entity::new("c", "project", "undated"),
            ],
            Vec::new(),
        );
        let candidates = TemporalStrategy::new().detect(&view).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].confidence, 0.8);
        assert_eq!(candidates[0].end_date, None);
        assert_eq!(
            candidates[0].description.as_deref(),
            Some("Co-occurred during from 2020-03-01 onwards")
        );
    }

    #[tokio::test]
    async fn test_ranges_from_dated_edges() {
        let start = NaiveDate::from_ymd_opt(2018, 1, 1);
        let end = NaiveDate::from_ymd_opt(2020, 12, 31);
        let entities = vec![
            Entity::new("p-1", "person", "Ada"),
            Entity::new("p-2", "person", "Grace"),
            Entity::new("o-1", "organization", "Acme"),
        ];
        let edges = vec![
            Edge::new("p-1", "o-1", "works_at").with_dates(start, end),
            Edge::new("p-2", "o-1", "works_at")
                .with_dates(NaiveDate::from_ymd_opt(2020, 1, 1), None),
        ];
        let view = GraphView::new(entities, edges, vec!["p-1".to_string()]);

        let candidates = TemporalStrategy::new().detect(&view).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!((candidates[0].from_id.as_str(), candidates[0].to_id.as_str()), ("p-1", "p-2"));
        assert_eq!(candidates[0].confidence, 0.7);
    }

    #[tokio::test]
    async fn test_pairs_outside_scope_ignored() {
        let entities = vec![
            dated("a", "2020-01-01", Some("2020-12-31")),
            dated("b", "2020-01-01", Some("2020-12-31")),
            dated("c", "2030-01-01", Some("2030-12-31")),
        ];
        let view = GraphView::new(entities, Vec::new(), vec!["c".to_string()]);
        assert!(TemporalStrategy::new().detect(&view).await.unwrap().is_empty());
    }
}
