//! Immutable, time-sorted event catalog.
//!
//! The catalog is the only source of truth a rebuild reads. Events are kept in
//! `(timestamp, id)` order so that positions in the catalog double as the
//! dense integer keys used by the clustering pass.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{EventId, SeismicEvent, TimeRange};

pub mod ingest;

pub use ingest::{load_catalog, parse_csv, parse_json_lines, IngestReport};

/// Why a record did not make it into clustering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// Malformed or out-of-range field.
    Validation(String),
    /// Id already seen earlier in the input.
    DuplicateId,
    /// Record type other than "earthquake" (quarry blast, explosion, ...).
    NotEarthquake(String),
    /// Latitude, longitude or magnitude is NaN or infinite.
    NonFiniteCoordinates,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Validation(msg) => write!(f, "validation failed: {}", msg),
            SkipReason::DuplicateId => write!(f, "duplicate id"),
            SkipReason::NotEarthquake(kind) => write!(f, "event type '{}' is not an earthquake", kind),
            SkipReason::NonFiniteCoordinates => write!(f, "non-finite coordinates or magnitude"),
        }
    }
}

/// A rejected or excluded record, reported in the rebuild summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    /// Event id when known, otherwise the input line number.
    pub record: String,
    pub reason: SkipReason,
}

impl SkippedRecord {
    pub fn new(record: impl Into<String>, reason: SkipReason) -> Self {
        Self { record: record.into(), reason }
    }
}

/// Time-sorted, duplicate-free event catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    events: Vec<SeismicEvent>,
    positions: HashMap<EventId, usize>,
    skipped: Vec<SkippedRecord>,
    received: usize,
}

impl CatalogStore {
    /// Build a catalog from cleaned events.
    ///
    /// The first occurrence of an id wins; later duplicates are recorded as
    /// skipped rather than failing the build.
    pub fn from_events(events: Vec<SeismicEvent>) -> Self {
        Self::with_rejections(events, Vec::new(), None)
    }

    /// Build a catalog from an ingestion pass, carrying its rejections along.
    pub fn from_ingest(report: IngestReport) -> Self {
        let received = report.rows_read;
        Self::with_rejections(report.events, report.rejected, Some(received))
    }

    fn with_rejections(
        events: Vec<SeismicEvent>,
        mut skipped: Vec<SkippedRecord>,
        received: Option<usize>,
    ) -> Self {
        let received = received.unwrap_or(events.len() + skipped.len());

        let mut seen: HashSet<EventId> = HashSet::with_capacity(events.len());
        let mut unique = Vec::with_capacity(events.len());
        for event in events {
            if seen.contains(&event.id) {
                skipped.push(SkippedRecord::new(event.id.clone(), SkipReason::DuplicateId));
                continue;
            }
            seen.insert(event.id.clone());
            unique.push(event);
        }

        unique.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        let positions = unique.iter().enumerate().map(|(i, e)| (e.id.clone(), i)).collect();

        Self { events: unique, positions, skipped, received }
    }

    /// Events in `(timestamp, id)` order.
    pub fn events(&self) -> &[SeismicEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SeismicEvent> {
        self.positions.get(id).map(|&i| &self.events[i])
    }

    /// Position of an event in catalog order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Records dropped before they reached the catalog.
    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }

    /// Number of input records this catalog was built from.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Earliest and latest timestamps, if any.
    pub fn time_bounds(&self) -> Option<TimeRange> {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => Some(TimeRange::new(first.timestamp, last.timestamp)),
            _ => None,
        }
    }

    /// Events whose timestamp lies in the inclusive range.
    pub fn events_between(&self, range: TimeRange) -> &[SeismicEvent] {
        let lo = self.events.partition_point(|e| e.timestamp < range.start);
        let hi = self.events.partition_point(|e| e.timestamp <= range.end);
        if lo >= hi {
            &[]
        } else {
            &self.events[lo..hi]
        }
    }
}
