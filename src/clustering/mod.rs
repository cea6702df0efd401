//! Space-time clustering.
//!
//! Two events are linked when their epicenters are within the radius of the
//! larger of the two magnitudes and their origin times are within the swarm
//! window. Clusters are the connected components of that relation. Mainshocks
//! are never linked; each one forms its own cluster.
//!
//! The sequential path lives in [`builder`], the tiled rayon path in
//! [`parallel`]. Both feed the same union-find read-off, so cluster ids and
//! membership do not depend on the path taken.

use serde::{Deserialize, Serialize};

use crate::catalog::SkippedRecord;
use crate::core::{spherical_centroid, EventId, SeismicEvent, TimeRange};

pub mod builder;
pub mod parallel;
pub mod union_find;

pub use builder::ClusterBuilder;
pub use union_find::DisjointSet;

/// Dense cluster identifier, assigned in order of each cluster's earliest event.
pub type ClusterId = u32;

/// Connected component of linked events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    /// Member ids in `(timestamp, id)` order.
    pub members: Vec<EventId>,
    pub centroid_latitude: f64,
    pub centroid_longitude: f64,
    /// Timestamp of the first member.
    pub start: i64,
    /// Timestamp of the last member.
    pub end: i64,
    pub peak_magnitude: f64,
    pub peak_event_id: EventId,
    /// Catalog positions of the members, parallel to `members`.
    #[serde(skip)]
    pub(crate) positions: Vec<u32>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    pub fn span(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }

    /// Catalog positions of the members.
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    /// Builds a cluster from ascending catalog positions.
    pub(crate) fn from_positions(id: ClusterId, positions: Vec<u32>, events: &[SeismicEvent]) -> Self {
        let members: Vec<&SeismicEvent> = positions.iter().map(|&p| &events[p as usize]).collect();
        let first = members[0];

        let mut peak = first;
        for event in &members[1..] {
            if event.magnitude > peak.magnitude {
                peak = event;
            }
        }

        let (centroid_latitude, centroid_longitude) =
            spherical_centroid(members.iter().map(|e| (e.latitude, e.longitude)))
                .unwrap_or((first.latitude, first.longitude));

        Self {
            id,
            members: members.iter().map(|e| e.id.clone()).collect(),
            centroid_latitude,
            centroid_longitude,
            start: first.timestamp,
            end: members[members.len() - 1].timestamp,
            peak_magnitude: peak.magnitude,
            peak_event_id: peak.id.clone(),
            positions,
        }
    }
}

/// Result of one clustering pass.
#[derive(Debug, Clone, Default)]
pub struct ClusteringOutput {
    /// Clusters ordered by id.
    pub clusters: Vec<Cluster>,
    /// Cluster of each catalog position; `None` for skipped events.
    pub assignment: Vec<Option<ClusterId>>,
    /// Events excluded from clustering.
    pub skipped: Vec<SkippedRecord>,
    /// Number of distinct linked pairs found by the scan.
    pub edges: usize,
}

impl ClusteringOutput {
    pub fn singleton_count(&self) -> usize {
        self.clusters.iter().filter(|c| c.is_singleton()).count()
    }

    /// Reads components off a finished union-find over catalog positions.
    pub(crate) fn read_off(
        events: &[SeismicEvent],
        eligible: &[bool],
        set: &mut DisjointSet,
        skipped: Vec<SkippedRecord>,
        edges: usize,
    ) -> Self {
        let mut slot_of_root = vec![u32::MAX; events.len()];
        let mut groups: Vec<Vec<u32>> = Vec::new();
        let mut assignment = vec![None; events.len()];

        for pos in 0..events.len() as u32 {
            if !eligible[pos as usize] {
                continue;
            }
            let root = set.find(pos) as usize;
            if slot_of_root[root] == u32::MAX {
                slot_of_root[root] = groups.len() as u32;
                groups.push(Vec::new());
            }
            let slot = slot_of_root[root];
            groups[slot as usize].push(pos);
            assignment[pos as usize] = Some(slot);
        }

        let clusters = groups
            .into_iter()
            .enumerate()
            .map(|(id, positions)| Cluster::from_positions(id as ClusterId, positions, events))
            .collect();

        Self { clusters, assignment, skipped, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_attributes() {
        let events = vec![
            SeismicEvent::new("a", 0, 40.0, 15.0, 5.0, 2.0),
            SeismicEvent::new("b", 10, 40.02, 15.0, 5.0, 2.6),
            SeismicEvent::new("c", 20, 40.04, 15.0, 5.0, 2.6),
        ];
        let cluster = Cluster::from_positions(7, vec![0, 1, 2], &events);
        assert_eq!(cluster.id, 7);
        assert_eq!(cluster.members, vec!["a", "b", "c"]);
        assert_eq!(cluster.span(), TimeRange::new(0, 20));
        // Ties on magnitude keep the earlier event.
        assert_eq!(cluster.peak_event_id, "b");
        assert!((cluster.centroid_latitude - 40.02).abs() < 1e-6);
        assert!((cluster.centroid_longitude - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_centroid_across_antimeridian() {
        let events = vec![
            SeismicEvent::new("w", 0, -17.0, 179.95, 5.0, 2.0),
            SeismicEvent::new("e", 1, -17.0, -179.95, 5.0, 2.0),
        ];
        let cluster = Cluster::from_positions(0, vec![0, 1], &events);
        assert!(cluster.centroid_longitude.abs() > 179.9);
    }
}
