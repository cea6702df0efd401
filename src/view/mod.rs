//! Materialized swarm view.
//!
//! A [`MaterializedView`] is built in one go from a catalog snapshot by
//! [`rebuild`] and never changes afterwards. Readers share it behind an `Arc`;
//! a newer catalog produces a new view that replaces the old one wholesale.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::association::{MainshockAssociator, Swarm, SwarmId};
use crate::catalog::{CatalogStore, SkippedRecord};
use crate::clustering::{Cluster, ClusterBuilder, ClusterId};
use crate::config::SwarmConfig;
use crate::core::{haversine_km, millis_to_days, CancelToken, EventId, SeismicEvent, TimeRange};
use crate::error::Result;

pub mod table;

pub use table::{SwarmRow, SwarmTable};

/// Counts describing the last rebuild.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RebuildSummary {
    /// Input records seen, including rejected ones.
    pub events_received: usize,
    /// Events that ended up in a cluster.
    pub events_processed: usize,
    pub events_skipped: usize,
    /// Events left out by the region filter.
    pub events_filtered: usize,
    pub skipped: Vec<SkippedRecord>,
    pub clusters_formed: usize,
    pub singleton_clusters: usize,
    pub edges: usize,
    pub mainshocks: usize,
    pub swarms_matched: usize,
    pub unclassified_clusters: usize,
}

/// One swarm member seen from its mainshock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmMember {
    pub event: SeismicEvent,
    pub days_before_mainshock: f64,
    pub distance_to_mainshock_km: f64,
}

#[derive(Debug, Clone, Copy)]
struct EventSlot {
    position: usize,
    cluster: Option<ClusterId>,
}

/// Immutable result of one rebuild.
#[derive(Debug, Clone, Default)]
pub struct MaterializedView {
    events: Vec<SeismicEvent>,
    event_slots: HashMap<EventId, EventSlot>,
    clusters: Vec<Cluster>,
    swarms: BTreeMap<SwarmId, Swarm>,
    mainshock_swarms: BTreeMap<EventId, Vec<SwarmId>>,
    summary: RebuildSummary,
}

impl MaterializedView {
    /// View with no events, served before the first rebuild completes.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rebuild_summary(&self) -> &RebuildSummary {
        &self.summary
    }

    pub fn event(&self, id: &str) -> Option<&SeismicEvent> {
        self.event_slots.get(id).map(|slot| &self.events[slot.position])
    }

    /// Events the view was built from, in catalog order.
    pub fn events(&self) -> &[SeismicEvent] {
        &self.events
    }

    /// Clusters ordered by id.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id as usize)
    }

    pub fn cluster_for_event(&self, event_id: &str) -> Option<&Cluster> {
        let cluster = self.event_slots.get(event_id)?.cluster?;
        self.clusters.get(cluster as usize)
    }

    pub fn swarm(&self, id: SwarmId) -> Option<&Swarm> {
        self.swarms.get(&id)
    }

    /// Swarms ordered by id.
    pub fn swarms(&self) -> impl Iterator<Item = &Swarm> {
        self.swarms.values()
    }

    /// Swarms of a mainshock by lead time ascending; empty when it has none.
    pub fn swarms_for_mainshock(&self, mainshock_id: &str) -> Vec<&Swarm> {
        self.mainshock_swarms
            .get(mainshock_id)
            .map(|ids| ids.iter().filter_map(|id| self.swarms.get(id)).collect())
            .unwrap_or_default()
    }

    /// Clusters not claimed as a swarm by any mainshock.
    pub fn unclassified_clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(|c| !self.swarms.contains_key(&c.id))
    }

    /// Swarms whose centroid is within `radius_km` and whose span meets `range`.
    pub fn swarms_near(&self, latitude: f64, longitude: f64, radius_km: f64, range: TimeRange) -> Vec<&Swarm> {
        self.swarms
            .values()
            .filter(|s| s.cluster.span().intersects(&range))
            .filter(|s| {
                haversine_km(latitude, longitude, s.cluster.centroid_latitude, s.cluster.centroid_longitude)
                    <= radius_km
            })
            .collect()
    }

    /// Per-member rows of a swarm relative to its mainshock.
    pub fn swarm_members(&self, id: SwarmId) -> Option<Vec<SwarmMember>> {
        let swarm = self.swarms.get(&id)?;
        let mainshock = self.event(&swarm.mainshock_id)?;
        let rows = swarm
            .cluster
            .positions()
            .iter()
            .map(|&p| {
                let event = &self.events[p as usize];
                SwarmMember {
                    event: event.clone(),
                    days_before_mainshock: millis_to_days(mainshock.timestamp - event.timestamp),
                    distance_to_mainshock_km: event.distance_km(mainshock),
                }
            })
            .collect();
        Some(rows)
    }

    /// Persistable swarm table of this view.
    pub fn to_table(&self) -> SwarmTable {
        SwarmTable::from_swarms(self.swarms.values())
    }
}

/// Build a new view from a catalog snapshot.
pub fn rebuild(catalog: &CatalogStore, config: &SwarmConfig) -> Result<MaterializedView> {
    rebuild_with_cancel(catalog, config, &CancelToken::new())
}

/// Build a new view, giving up with `Cancelled` once `cancel` fires.
pub fn rebuild_with_cancel(
    catalog: &CatalogStore,
    config: &SwarmConfig,
    cancel: &CancelToken,
) -> Result<MaterializedView> {
    config.validate()?;
    cancel.check()?;

    let started = Instant::now();
    info!("Rebuilding swarm view from {} catalog events", catalog.len());

    let events: Cow<'_, [SeismicEvent]> = match &config.region_filter {
        Some(region) => Cow::Owned(
            catalog
                .events()
                .iter()
                .filter(|e| e.region.as_deref().is_some_and(|r| r.eq_ignore_ascii_case(region)))
                .cloned()
                .collect(),
        ),
        None => Cow::Borrowed(catalog.events()),
    };
    let events_filtered = catalog.len() - events.len();
    if events_filtered > 0 {
        debug!("Region filter left {} of {} events", events.len(), catalog.len());
    }

    let clustering = ClusterBuilder::new(config).with_cancel(cancel.clone()).build(&events)?;
    cancel.check()?;

    let association = MainshockAssociator::new(config)
        .with_cancel(cancel.clone())
        .associate(&events, &clustering)?;
    cancel.check()?;

    let mut skipped: Vec<SkippedRecord> = catalog.skipped().to_vec();
    skipped.extend(clustering.skipped.iter().cloned());
    if !skipped.is_empty() {
        warn!("{} records skipped during rebuild", skipped.len());
    }

    let events = events.into_owned();
    let event_slots = events
        .iter()
        .enumerate()
        .map(|(position, e)| (e.id.clone(), EventSlot { position, cluster: clustering.assignment[position] }))
        .collect();

    let summary = RebuildSummary {
        events_received: catalog.received(),
        events_processed: clustering.assignment.iter().filter(|a| a.is_some()).count(),
        events_skipped: skipped.len(),
        events_filtered,
        skipped,
        clusters_formed: clustering.clusters.len(),
        singleton_clusters: clustering.singleton_count(),
        edges: clustering.edges,
        mainshocks: association.mainshocks,
        swarms_matched: association.swarms.len(),
        unclassified_clusters: clustering.clusters.len() - association.swarms.len(),
    };

    info!(
        "Rebuild finished in {:?}: {} clusters, {} mainshocks, {} swarms",
        started.elapsed(),
        summary.clusters_formed,
        summary.mainshocks,
        summary.swarms_matched
    );

    Ok(MaterializedView {
        events,
        event_slots,
        clusters: clustering.clusters,
        swarms: association.swarms.into_iter().map(|s| (s.swarm_id, s)).collect(),
        mainshock_swarms: association.by_mainshock,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SkipReason;
    use crate::core::MILLIS_PER_HOUR;
    use crate::SwarmError;

    fn ev(id: &str, hours: i64, lat: f64, lon: f64, mag: f64) -> SeismicEvent {
        SeismicEvent::new(id, hours * MILLIS_PER_HOUR, lat, lon, 10.0, mag)
    }

    fn sample_catalog() -> CatalogStore {
        CatalogStore::from_events(vec![
            ev("e1", 0, 40.0, 15.0, 2.0).with_region("Italy"),
            ev("e2", 2, 40.01, 15.01, 2.3).with_region("Italy"),
            ev("m1", 36, 40.0, 15.0, 5.5).with_region("Italy"),
            ev("g1", 5, 38.0, 23.0, 2.1).with_region("Greece"),
            ev("bad", 6, f64::INFINITY, 23.0, 2.1),
        ])
    }

    #[test]
    fn test_summary_counts() {
        let view = rebuild(&sample_catalog(), &SwarmConfig::default()).unwrap();
        let summary = view.rebuild_summary();
        assert_eq!(summary.events_received, 5);
        assert_eq!(summary.events_processed, 4);
        assert_eq!(summary.events_skipped, 1);
        assert_eq!(summary.skipped[0].reason, SkipReason::NonFiniteCoordinates);
        assert_eq!(summary.clusters_formed, 3);
        assert_eq!(summary.singleton_clusters, 2);
        assert_eq!(summary.mainshocks, 1);
        assert_eq!(summary.swarms_matched, 1);
        assert_eq!(summary.unclassified_clusters, 2);
        assert!(view.cluster_for_event("bad").is_none());
    }

    #[test]
    fn test_region_filter() {
        let config = SwarmConfig::default().with_region_filter("greece");
        let view = rebuild(&sample_catalog(), &config).unwrap();
        assert_eq!(view.rebuild_summary().events_filtered, 4);
        assert_eq!(view.rebuild_summary().clusters_formed, 1);
        assert!(view.event("e1").is_none());
        assert!(view.cluster_for_event("g1").is_some());
    }

    #[test]
    fn test_swarm_members_detail() {
        let view = rebuild(&sample_catalog(), &SwarmConfig::default()).unwrap();
        let swarm = view.swarms_for_mainshock("m1")[0];
        let members = view.swarm_members(swarm.swarm_id).unwrap();
        assert_eq!(members.len(), 2);
        assert!((members[0].days_before_mainshock - 1.5).abs() < 1e-9);
        assert!(members[0].distance_to_mainshock_km < 1e-9);
        assert!(members[1].distance_to_mainshock_km > 1.0);
    }

    #[test]
    fn test_swarms_near_filters_space_and_time() {
        let view = rebuild(&sample_catalog(), &SwarmConfig::default()).unwrap();
        let all = TimeRange::unbounded();
        assert_eq!(view.swarms_near(40.0, 15.0, 10.0, all).len(), 1);
        assert!(view.swarms_near(38.0, 23.0, 10.0, all).is_empty());
        let after = TimeRange::new(3 * MILLIS_PER_HOUR, 10 * MILLIS_PER_HOUR);
        assert!(view.swarms_near(40.0, 15.0, 10.0, after).is_empty());
        let touching = TimeRange::new(2 * MILLIS_PER_HOUR, 10 * MILLIS_PER_HOUR);
        assert_eq!(view.swarms_near(40.0, 15.0, 10.0, touching).len(), 1);
    }

    #[test]
    fn test_invalid_config_aborts() {
        let config = SwarmConfig::default().with_cell_size_km(-5.0);
        assert!(matches!(rebuild(&sample_catalog(), &config), Err(SwarmError::Config(_))));
    }

    #[test]
    fn test_empty_view() {
        let view = MaterializedView::empty();
        assert!(view.swarms_for_mainshock("m1").is_empty());
        assert!(view.cluster_for_event("e1").is_none());
        assert_eq!(view.rebuild_summary(), &RebuildSummary::default());
    }
}
