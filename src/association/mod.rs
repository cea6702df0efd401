//! Mainshock association.
//!
//! Mainshocks are visited in catalog order. Each one looks at the clusters of
//! sub-threshold events that ended shortly before it and have at least one
//! member near its epicenter, ranks them, and claims the best unclaimed ones.
//! A claimed cluster is never offered to a later mainshock.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clustering::{Cluster, ClusterId, ClusteringOutput};
use crate::config::SwarmConfig;
use crate::core::{days_to_millis, haversine_km, millis_to_days, CancelToken, EventId, SeismicEvent};
use crate::error::Result;

/// A swarm keeps the id of the cluster it was made from.
pub type SwarmId = ClusterId;

const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Cluster classified as the foreshock swarm of a mainshock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swarm {
    pub swarm_id: SwarmId,
    pub mainshock_id: EventId,
    pub mainshock_magnitude: f64,
    /// Mainshock time minus the swarm's last event time.
    pub lead_time_ms: i64,
    pub event_count: usize,
    /// Mainshock magnitude minus the swarm's peak magnitude.
    pub magnitude_gap: f64,
    /// Swarm centroid to mainshock epicenter.
    pub distance_km: f64,
    pub cluster: Cluster,
}

impl Swarm {
    pub fn lead_time_days(&self) -> f64 {
        millis_to_days(self.lead_time_ms)
    }

    pub fn lead_time_hours(&self) -> f64 {
        self.lead_time_ms as f64 / crate::core::MILLIS_PER_HOUR as f64
    }

    pub fn members(&self) -> &[EventId] {
        &self.cluster.members
    }
}

/// Output of an association pass.
#[derive(Debug, Clone, Default)]
pub struct Association {
    /// Swarms ordered by swarm id.
    pub swarms: Vec<Swarm>,
    /// Swarm ids of each mainshock that received any, by lead time ascending.
    pub by_mainshock: BTreeMap<EventId, Vec<SwarmId>>,
    /// Mainshocks considered.
    pub mainshocks: usize,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    cluster: ClusterId,
    event_count: usize,
    peak_magnitude: f64,
    distance_km: f64,
}

impl Candidate {
    /// Most events, then larger peak, then closer centroid, then lower id.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .event_count
            .cmp(&self.event_count)
            .then_with(|| other.peak_magnitude.total_cmp(&self.peak_magnitude))
            .then_with(|| self.distance_km.total_cmp(&other.distance_km))
            .then_with(|| self.cluster.cmp(&other.cluster))
    }
}

/// Matches clusters to the mainshocks they precede.
pub struct MainshockAssociator<'a> {
    config: &'a SwarmConfig,
    cancel: CancelToken,
}

impl<'a> MainshockAssociator<'a> {
    pub fn new(config: &'a SwarmConfig) -> Self {
        Self { config, cancel: CancelToken::new() }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Associate the clusters of `clustering`, built over the same `events`.
    pub fn associate(&self, events: &[SeismicEvent], clustering: &ClusteringOutput) -> Result<Association> {
        let lead_ms = days_to_millis(self.config.lead_time_window_days);
        let threshold = self.config.mainshock_magnitude_threshold;

        // Sub-threshold clusters by end time.
        let mut by_end: Vec<(i64, ClusterId)> = clustering
            .clusters
            .iter()
            .filter(|c| c.peak_magnitude < threshold)
            .map(|c| (c.end, c.id))
            .collect();
        by_end.sort_unstable();

        let mut claimed = vec![false; clustering.clusters.len()];
        let mut swarms = Vec::new();
        let mut by_mainshock: BTreeMap<EventId, Vec<SwarmId>> = BTreeMap::new();
        let mut mainshocks = 0usize;

        for (pos, mainshock) in events.iter().enumerate() {
            if clustering.assignment[pos].is_none() || !self.config.is_mainshock(mainshock.magnitude) {
                continue;
            }
            if mainshocks % CANCEL_CHECK_INTERVAL == 0 {
                self.cancel.check()?;
            }
            mainshocks += 1;

            let lo = by_end.partition_point(|&(end, _)| end < mainshock.timestamp.saturating_sub(lead_ms));
            let hi = by_end.partition_point(|&(end, _)| end < mainshock.timestamp);

            let mut candidates: Vec<Candidate> = by_end[lo..hi.max(lo)]
                .iter()
                .filter(|&&(_, id)| !claimed[id as usize])
                .map(|&(_, id)| &clustering.clusters[id as usize])
                .filter(|cluster| self.has_member_near(events, cluster, mainshock))
                .map(|cluster| Candidate {
                    cluster: cluster.id,
                    event_count: cluster.len(),
                    peak_magnitude: cluster.peak_magnitude,
                    distance_km: haversine_km(
                        cluster.centroid_latitude,
                        cluster.centroid_longitude,
                        mainshock.latitude,
                        mainshock.longitude,
                    ),
                })
                .collect();
            candidates.sort_by(Candidate::rank);

            let mut taken: Vec<(i64, SwarmId)> = Vec::new();
            for candidate in candidates.into_iter().take(self.config.max_swarms_per_mainshock) {
                let cluster = &clustering.clusters[candidate.cluster as usize];
                claimed[cluster.id as usize] = true;
                let lead_time_ms = mainshock.timestamp - cluster.end;
                taken.push((lead_time_ms, cluster.id));
                swarms.push(Swarm {
                    swarm_id: cluster.id,
                    mainshock_id: mainshock.id.clone(),
                    mainshock_magnitude: mainshock.magnitude,
                    lead_time_ms,
                    event_count: cluster.len(),
                    magnitude_gap: mainshock.magnitude - cluster.peak_magnitude,
                    distance_km: candidate.distance_km,
                    cluster: cluster.clone(),
                });
            }

            if !taken.is_empty() {
                taken.sort_unstable();
                by_mainshock.insert(mainshock.id.clone(), taken.into_iter().map(|(_, id)| id).collect());
            }
        }

        swarms.sort_by_key(|s| s.swarm_id);
        debug!("Associated {} swarms with {} mainshocks", swarms.len(), mainshocks);
        Ok(Association { swarms, by_mainshock, mainshocks })
    }

    fn has_member_near(&self, events: &[SeismicEvent], cluster: &Cluster, mainshock: &SeismicEvent) -> bool {
        cluster.positions().iter().any(|&p| {
            let e = &events[p as usize];
            haversine_km(e.latitude, e.longitude, mainshock.latitude, mainshock.longitude)
                <= self.config.association_radius_km
        })
    }
}
