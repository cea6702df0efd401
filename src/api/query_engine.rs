use std::sync::Arc;

use crate::association::{Swarm, SwarmId};
use crate::clustering::Cluster;
use crate::core::{SeismicEvent, TimeRange};
use crate::error::{Result, SwarmError};
use crate::view::{MaterializedView, RebuildSummary, SwarmMember};

/// Read-only queries against one view snapshot.
///
/// Holding a `QueryEngine` pins its snapshot: a rebuild that completes in the
/// meantime is only seen by engines created afterwards. Only lookups of an
/// unknown id fail; empty results are returned as empty vectors.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    view: Arc<MaterializedView>,
}

impl QueryEngine {
    pub fn new(view: Arc<MaterializedView>) -> Self {
        Self { view }
    }

    /// Swarms of a mainshock by lead time ascending.
    pub fn swarms_for_mainshock(&self, mainshock_id: &str) -> Vec<Swarm> {
        self.view.swarms_for_mainshock(mainshock_id).into_iter().cloned().collect()
    }

    /// The cluster an event belongs to, singleton or not.
    pub fn cluster_for_event(&self, event_id: &str) -> Result<Cluster> {
        self.view
            .cluster_for_event(event_id)
            .cloned()
            .ok_or_else(|| SwarmError::NotFound(format!("event '{}' is not in the current view", event_id)))
    }

    /// Swarms whose centroid lies within `radius_km` and whose time span
    /// intersects `range`, by swarm id.
    pub fn swarms_near(&self, latitude: f64, longitude: f64, radius_km: f64, range: TimeRange) -> Vec<Swarm> {
        self.view.swarms_near(latitude, longitude, radius_km, range).into_iter().cloned().collect()
    }

    pub fn rebuild_summary(&self) -> RebuildSummary {
        self.view.rebuild_summary().clone()
    }

    pub fn swarm(&self, swarm_id: SwarmId) -> Result<Swarm> {
        self.view
            .swarm(swarm_id)
            .cloned()
            .ok_or_else(|| SwarmError::NotFound(format!("swarm {}", swarm_id)))
    }

    pub fn swarm_members(&self, swarm_id: SwarmId) -> Result<Vec<SwarmMember>> {
        self.view
            .swarm_members(swarm_id)
            .ok_or_else(|| SwarmError::NotFound(format!("swarm {}", swarm_id)))
    }

    /// Clusters no mainshock claimed, by cluster id.
    pub fn unclassified_clusters(&self) -> Vec<Cluster> {
        self.view.unclassified_clusters().cloned().collect()
    }

    pub fn event(&self, event_id: &str) -> Result<SeismicEvent> {
        self.view
            .event(event_id)
            .cloned()
            .ok_or_else(|| SwarmError::NotFound(format!("event '{}'", event_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogStore;
    use crate::config::SwarmConfig;
    use crate::core::MILLIS_PER_DAY;
    use crate::view::rebuild;

    fn engine() -> QueryEngine {
        let catalog = CatalogStore::from_events(vec![
            SeismicEvent::new("e1", 0, 35.0, 139.0, 10.0, 2.2),
            SeismicEvent::new("e2", 3_600_000, 35.01, 139.0, 10.0, 2.4),
            SeismicEvent::new("lone", 40 * MILLIS_PER_DAY, -20.0, -70.0, 30.0, 2.0),
            SeismicEvent::new("m1", 2 * MILLIS_PER_DAY, 35.0, 139.05, 12.0, 6.1),
        ]);
        QueryEngine::new(Arc::new(rebuild(&catalog, &SwarmConfig::default()).unwrap()))
    }

    #[test]
    fn test_not_found_only_for_unknown_ids() {
        let engine = engine();
        assert!(matches!(engine.cluster_for_event("nope"), Err(SwarmError::NotFound(_))));
        assert!(matches!(engine.swarm(99), Err(SwarmError::NotFound(_))));
        assert!(engine.swarms_for_mainshock("nope").is_empty());
        assert!(engine.swarms_near(0.0, 0.0, 1.0, TimeRange::unbounded()).is_empty());
    }

    #[test]
    fn test_lookups() {
        let engine = engine();
        let swarms = engine.swarms_for_mainshock("m1");
        assert_eq!(swarms.len(), 1);
        let swarm = engine.swarm(swarms[0].swarm_id).unwrap();
        assert_eq!(swarm.members(), ["e1", "e2"]);
        assert_eq!(engine.cluster_for_event("e2").unwrap().id, swarm.swarm_id);
        assert_eq!(engine.swarm_members(swarm.swarm_id).unwrap().len(), 2);

        let unclassified: Vec<Vec<String>> =
            engine.unclassified_clusters().into_iter().map(|c| c.members).collect();
        assert_eq!(unclassified, vec![vec!["m1".to_string()], vec!["lone".to_string()]]);
        assert_eq!(engine.event("lone").unwrap().depth_km, 30.0);
        assert_eq!(engine.rebuild_summary().swarms_matched, 1);
    }
}
