//! Tiled clustering on the rayon pool.
//!
//! The globe is cut into latitude bands. Each band is scanned with the events
//! it owns plus a halo of neighbors from adjacent bands, wide enough to hold
//! every event an owned event could link to. Only owned events query, so each
//! linked pair is found once, in the band owning its later event. Each band
//! reports `(event, local root)` pairs; the pairs are then merged into the
//! global union-find one band at a time, in band order.

use rayon::prelude::*;
use tracing::debug;

use super::builder::{scan_links, LinkPlan, LinkPoint};
use super::DisjointSet;
use crate::core::{CancelToken, KM_PER_DEGREE};
use crate::error::Result;

/// Extra halo width absorbing rounding in band arithmetic.
const HALO_SLACK_DEG: f64 = 1e-6;

/// Links found inside one latitude band.
#[derive(Debug)]
struct TilePartial {
    tile: usize,
    scanned: usize,
    edges: usize,
    /// `(position, root position)` pairs in catalog positions.
    links: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Copy)]
struct Bands {
    count: usize,
    height_deg: f64,
    halo_deg: f64,
}

impl Bands {
    fn new(count: usize, max_radius_km: f64) -> Self {
        let count = count.max(1);
        Self {
            count,
            height_deg: 180.0 / count as f64,
            halo_deg: max_radius_km / KM_PER_DEGREE + HALO_SLACK_DEG,
        }
    }

    fn home(&self, latitude: f64) -> usize {
        let band = ((latitude + 90.0) / self.height_deg).floor();
        if band <= 0.0 {
            0
        } else {
            (band as usize).min(self.count - 1)
        }
    }

    /// Latitude range scanned for a band, halo included.
    fn scanned_range(&self, tile: usize) -> (f64, f64) {
        let lo = -90.0 + tile as f64 * self.height_deg;
        (lo - self.halo_deg, lo + self.height_deg + self.halo_deg)
    }
}

/// Link `plan.points` in parallel bands and merge the result into `set`.
pub(crate) fn link_tiled(
    plan: &LinkPlan,
    tiles: usize,
    set: &mut DisjointSet,
    cancel: &CancelToken,
) -> Result<usize> {
    let bands = Bands::new(tiles, plan.max_radius_km);

    let partials: Vec<Result<TilePartial>> = (0..bands.count)
        .into_par_iter()
        .map(|tile| link_tile(plan, bands, tile, cancel))
        .collect();

    let mut edges = 0;
    for partial in partials {
        let partial = partial?;
        debug!(
            "Band {} scanned {} events, {} edges, {} links",
            partial.tile,
            partial.scanned,
            partial.edges,
            partial.links.len()
        );
        for (position, root) in partial.links {
            set.union(position, root);
        }
        edges += partial.edges;
    }
    Ok(edges)
}

fn link_tile(plan: &LinkPlan, bands: Bands, tile: usize, cancel: &CancelToken) -> Result<TilePartial> {
    let (lo, hi) = bands.scanned_range(tile);
    let points: Vec<LinkPoint> = plan
        .points
        .iter()
        .filter(|p| p.latitude >= lo && p.latitude <= hi)
        .copied()
        .collect();

    let mut local = DisjointSet::new(points.len());
    let edges = scan_links(&points, |p| bands.home(p.latitude) == tile, plan, &mut local, cancel)?;

    let mut links = Vec::new();
    for i in 0..points.len() as u32 {
        let root = local.find(i);
        if root != i {
            links.push((points[i as usize].position, points[root as usize].position));
        }
    }

    Ok(TilePartial { tile, scanned: points.len(), edges, links })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::ClusterBuilder;
    use crate::config::{Parallelism, SwarmConfig};
    use crate::core::{SeismicEvent, MILLIS_PER_HOUR};

    #[test]
    fn test_band_membership() {
        let bands = Bands::new(4, 0.0);
        assert_eq!(bands.home(-90.0), 0);
        assert_eq!(bands.home(-45.0), 1);
        assert_eq!(bands.home(0.0), 2);
        assert_eq!(bands.home(90.0), 3);
        let (lo, hi) = bands.scanned_range(1);
        assert!(lo < -45.0 && hi > 0.0);
    }

    #[test]
    fn test_cluster_straddling_band_edge() {
        // Band edge at latitude 0 with two bands; the chain crosses it.
        let events: Vec<SeismicEvent> = (0..6)
            .map(|i| {
                SeismicEvent::new(
                    format!("e{}", i),
                    i64::from(i) * MILLIS_PER_HOUR,
                    -0.1 + f64::from(i) * 0.04,
                    120.0,
                    10.0,
                    2.0,
                )
            })
            .collect();

        let sequential = SwarmConfig::default();
        let tiled = SwarmConfig::default().with_parallelism(Parallelism::Tiled { tiles: 2 });

        let a = ClusterBuilder::new(&sequential).build(&events).unwrap();
        let b = ClusterBuilder::new(&tiled).build(&events).unwrap();
        assert_eq!(a.clusters.len(), 1);
        assert_eq!(a.clusters, b.clusters);
        assert_eq!(a.edges, b.edges);
    }
}
