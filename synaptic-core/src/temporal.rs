//! Date ranges and inclusive overlap

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Parse `YYYY-MM-DD`, `YYYY-MM` or `YYYY` (partial dates snap to the first day)
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    // Timestamps like 2021-06-01T00:00:00Z keep only their date part
    let date_part = raw.trim().split('T').next()?;

    match date_part.len() {
        10 => NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok(),
        // chrono needs a day to build a NaiveDate
        7 => NaiveDate::parse_from_str(&format!("{}-01", date_part), "%Y-%m-%d").ok(),
        4 => date_part
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        _ => None,
    }
}

/// A closed date interval; a missing bound is open-ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// The intersection of two ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Build from raw strings; `None` when neither bound parses (undated)
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Option<Self> {
        let start = start.and_then(parse_date);
        let end = end.and_then(parse_date);
        let range = Self { start, end };
        if range.is_dated() {
            Some(range)
        } else {
            None
        }
    }

    pub fn is_dated(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    /// Inclusive overlap: `max(s1, s2) <= min(e1, e2)`
    pub fn overlap(&self, other: &DateRange) -> Option<Overlap> {
        if !self.is_dated() || !other.is_dated() {
            return None;
        }

        let start = match (self.start, other.start) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let end = match (self.end, other.end) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        match (start, end) {
            (Some(s), Some(e)) if s > e => None,
            _ => Some(Overlap { start, end }),
        }
    }
}

impl Overlap {
    /// Length in days; `None` when open-ended
    pub fn days(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(s), Some(e)) => Some((e - s).num_days()),
            _ => None,
        }
    }

    /// Human-readable period
    pub fn describe(&self) -> String {
        match (self.start, self.end) {
            (Some(s), Some(e)) => format!("{} to {}", s, e),
            (Some(s), None) => format!("from {} onwards", s),
            (None, Some(e)) => format!("until {}", e),
            (None, None) => "an open-ended period".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::parse(Some(start), Some(end)).unwrap()
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(parse_date("2021-06-15"), NaiveDate::from_ymd_opt(2021, 6, 15));
        assert_eq!(parse_date("2021-06"), NaiveDate::from_ymd_opt(2021, 6, 1));
        assert_eq!(parse_date("2021"), NaiveDate::from_ymd_opt(2021, 1, 1));
        assert_eq!(parse_date("2021-06-15T10:00:00Z"), NaiveDate::from_ymd_opt(2021, 6, 15));
        assert_eq!(parse_date("soon"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_overlap_contained() {
        let job = range("2020-01-01", "2022-12-31");
        let project = range("2021-06-01", "2021-12-31");
        let overlap = job.overlap(&project).unwrap();
        assert_eq!(overlap.start, Some(d("2021-06-01")));
        assert_eq!(overlap.end, Some(d("2021-12-31")));
    }

    #[test]
    fn test_disjoint_ranges() {
        let a = range("2020-01-01", "2020-12-31");
        let b = range("2021-01-01", "2021-12-31");
        assert!(a.overlap(&b).is_none());
        assert!(b.overlap(&a).is_none());
    }

    #[test]
    fn test_equal_boundary_counts() {
        let a = range("2020-01-01", "2020-06-30");
        let b = range("2020-06-30", "2020-12-31");
        let overlap = a.overlap(&b).unwrap();
        assert_eq!(overlap.days(), Some(0));
    }

    #[test]
    fn test_open_ended() {
        let ongoing = DateRange::parse(Some("2019-03-01"), None).unwrap();
        let later = range("2023-01-01", "2023-02-01");
        let overlap = ongoing.overlap(&later).unwrap();
        assert_eq!(overlap.start, Some(d("2023-01-01")));

        let both_open = DateRange::parse(Some("2024-01-01"), None).unwrap();
        let overlap = ongoing.overlap(&both_open).unwrap();
        assert_eq!(overlap.days(), None);
        assert!(overlap.describe().contains("onwards"));
    }

    #[test]
    fn test_undated_never_overlaps() {
        assert!(DateRange::parse(None, None).is_none());
        assert!(DateRange::parse(Some("garbage"), None).is_none());

        let undated = DateRange::new(None, None);
        let dated = range("2020-01-01", "2020-12-31");
        assert!(undated.overlap(&dated).is_none());
    }
}
