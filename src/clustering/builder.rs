use tracing::{debug, warn};

use super::parallel;
use super::{ClusteringOutput, DisjointSet};
use crate::catalog::{SkipReason, SkippedRecord};
use crate::config::{Parallelism, SwarmConfig};
use crate::core::{days_to_millis, CancelToken, SeismicEvent};
use crate::error::Result;
use crate::indexing::{PointId, SpatialIndex, WindowScanner};

/// Scan steps between two looks at the cancellation flag.
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Sub-threshold event taking part in linking.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkPoint {
    /// Position in the catalog.
    pub position: u32,
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: f64,
    pub radius_km: f64,
}

impl LinkPoint {
    /// Link distance for a pair: the radius at the larger of the two
    /// magnitudes, read off whichever point carries it.
    fn pair_radius_km(&self, other: &LinkPoint) -> f64 {
        if other.magnitude > self.magnitude {
            other.radius_km
        } else {
            self.radius_km
        }
    }
}

/// Everything both linking paths need, derived once from the catalog.
#[derive(Debug)]
pub(crate) struct LinkPlan {
    pub eligible: Vec<bool>,
    pub skipped: Vec<SkippedRecord>,
    /// Linkable events in catalog order.
    pub points: Vec<LinkPoint>,
    pub window_ms: i64,
    pub max_radius_km: f64,
    pub cell_size_km: f64,
}

impl LinkPlan {
    fn prepare(events: &[SeismicEvent], config: &SwarmConfig) -> Self {
        let mut eligible = vec![false; events.len()];
        let mut skipped = Vec::new();
        let mut points = Vec::new();
        let mut max_radius_km: f64 = 0.0;

        for (pos, event) in events.iter().enumerate() {
            if !event.is_clusterable() {
                skipped.push(SkippedRecord::new(event.id.clone(), SkipReason::NonFiniteCoordinates));
                continue;
            }
            eligible[pos] = true;
            if config.is_mainshock(event.magnitude) {
                continue;
            }
            let radius_km = config.radius_function.radius_km(event.magnitude);
            max_radius_km = max_radius_km.max(radius_km);
            points.push(LinkPoint {
                position: pos as u32,
                timestamp: event.timestamp,
                latitude: event.latitude,
                longitude: event.longitude,
                magnitude: event.magnitude,
                radius_km,
            });
        }

        if !skipped.is_empty() {
            warn!("Excluding {} events with non-finite coordinates or magnitude", skipped.len());
        }

        Self {
            eligible,
            skipped,
            points,
            window_ms: days_to_millis(config.swarm_window_days),
            max_radius_km,
            cell_size_km: config.cell_size_km.max(max_radius_km),
        }
    }
}

/// Builds space-time clusters over a time-sorted event slice.
pub struct ClusterBuilder<'a> {
    config: &'a SwarmConfig,
    cancel: CancelToken,
}

impl<'a> ClusterBuilder<'a> {
    pub fn new(config: &'a SwarmConfig) -> Self {
        Self { config, cancel: CancelToken::new() }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Cluster `events`, which must be in `(timestamp, id)` order.
    pub fn build(&self, events: &[SeismicEvent]) -> Result<ClusteringOutput> {
        let plan = LinkPlan::prepare(events, self.config);
        debug!(
            "Linking {} of {} events (max radius {:.2} km, cell {:.2} km)",
            plan.points.len(),
            events.len(),
            plan.max_radius_km,
            plan.cell_size_km
        );

        let mut set = DisjointSet::new(events.len());
        let edges = match self.config.parallelism {
            Parallelism::Sequential => link_sequential(&plan, &mut set, &self.cancel)?,
            Parallelism::Tiled { tiles } => parallel::link_tiled(&plan, tiles, &mut set, &self.cancel)?,
        };
        self.cancel.check()?;

        let output = ClusteringOutput::read_off(events, &plan.eligible, &mut set, plan.skipped, edges);
        debug!("Found {} edges forming {} clusters", output.edges, output.clusters.len());
        Ok(output)
    }
}

fn link_sequential(plan: &LinkPlan, set: &mut DisjointSet, cancel: &CancelToken) -> Result<usize> {
    let mut local = DisjointSet::new(plan.points.len());
    let edges = scan_links(&plan.points, |_| true, plan, &mut local, cancel)?;
    for i in 0..plan.points.len() as u32 {
        let root = local.find(i);
        if root != i {
            set.union(plan.points[i as usize].position, plan.points[root as usize].position);
        }
    }
    Ok(edges)
}

/// Causal scan over time-ordered points.
///
/// The spatial index holds only the trailing window: expired points are
/// removed, the current point queries if `queries` says so, and is then
/// inserted. Unions go into `set`, indexed by position in `points`. Returns
/// the number of linked pairs found.
pub(crate) fn scan_links<F>(
    points: &[LinkPoint],
    queries: F,
    plan: &LinkPlan,
    set: &mut DisjointSet,
    cancel: &CancelToken,
) -> Result<usize>
where
    F: Fn(&LinkPoint) -> bool,
{
    let timestamps: Vec<i64> = points.iter().map(|p| p.timestamp).collect();
    let mut index = SpatialIndex::new(plan.cell_size_km);
    let mut edges = 0;

    for step in WindowScanner::new(&timestamps, plan.window_ms) {
        if step.index % CANCEL_CHECK_INTERVAL == 0 {
            cancel.check()?;
        }
        for old in step.expired {
            let p = &points[old];
            index.remove(old as PointId, p.latitude, p.longitude);
        }

        let point = &points[step.index];
        if queries(point) {
            let hits = index.query_radius_with_distance(point.latitude, point.longitude, plan.max_radius_km);
            for (neighbor, distance) in hits {
                if distance <= point.pair_radius_km(&points[neighbor as usize]) {
                    edges += 1;
                    set.union(step.index as u32, neighbor);
                }
            }
        }
        index.insert(step.index as PointId, point.latitude, point.longitude);
    }
    Ok(edges)
}
