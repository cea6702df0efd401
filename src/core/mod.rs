//! Core data structures and types for the quakeswarm engine

use serde::{Deserialize, Serialize};

pub mod cancel;
pub mod geo;
pub use cancel::CancelToken;
pub use geo::*;

/// Event identifier as issued by the upstream catalog (e.g. "us7000kufc")
pub type EventId = String;

pub const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;
pub const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

/// Convert a (possibly fractional) number of days to milliseconds.
pub fn days_to_millis(days: f64) -> i64 {
    (days * MILLIS_PER_DAY as f64).round() as i64
}

/// Convert milliseconds to fractional days.
pub fn millis_to_days(millis: i64) -> f64 {
    millis as f64 / MILLIS_PER_DAY as f64
}

/// A cleaned seismic event.
/// The timestamp is UTC in milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicEvent {
    pub id: EventId,
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
}

impl SeismicEvent {
    pub fn new(
        id: impl Into<EventId>,
        timestamp: i64,
        latitude: f64,
        longitude: f64,
        depth_km: f64,
        magnitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            latitude,
            longitude,
            depth_km,
            magnitude,
            event_type: None,
            region: None,
            place: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Coordinates and magnitude are usable for clustering.
    pub fn is_clusterable(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite() && self.magnitude.is_finite()
    }

    /// Great-circle distance to another event's epicenter.
    pub fn distance_km(&self, other: &SeismicEvent) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Inclusive time range in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// A range covering every representable instant.
    pub fn unbounded() -> Self {
        Self { start: i64::MIN, end: i64::MAX }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    pub fn intersects(&self, other: &TimeRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_to_millis() {
        assert_eq!(days_to_millis(1.0), MILLIS_PER_DAY);
        assert_eq!(days_to_millis(0.5), 12 * MILLIS_PER_HOUR);
        assert!((millis_to_days(36 * MILLIS_PER_HOUR) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_time_range_intersection() {
        let a = TimeRange::new(100, 200);
        assert!(a.intersects(&TimeRange::new(200, 300)));
        assert!(a.intersects(&TimeRange::new(0, 100)));
        assert!(!a.intersects(&TimeRange::new(201, 300)));
        assert!(a.contains(150));
        assert!(!a.contains(99));
        assert!(TimeRange::unbounded().intersects(&a));
    }

    #[test]
    fn test_clusterable() {
        let ok = SeismicEvent::new("a", 0, 40.0, 15.0, 5.0, 2.0);
        assert!(ok.is_clusterable());
        let bad = SeismicEvent::new("b", 0, f64::NAN, 15.0, 5.0, 2.0);
        assert!(!bad.is_clusterable());
    }
}
