//! Grid spatial index with great-circle radius queries.
//!
//! The globe is cut into latitude rows `cell_size_km` tall. Each row is split
//! into as many columns as keep every column at least `cell_size_km` wide at
//! the row's pole-most latitude, so away from the poles a query whose radius
//! does not exceed the cell size only touches the 3x3 neighborhood of its
//! cell. Queries walk every cell that intersects the query circle rather than
//! only the cell holding the center, so points lying exactly on a cell
//! boundary are found.

use std::collections::HashMap;

use crate::core::{haversine_km, EARTH_RADIUS_KM, KM_PER_DEGREE};

/// Dense point identifier (position in the slice being indexed).
pub type PointId = u32;

/// Grid partition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpatialCell {
    pub row: u32,
    pub col: u32,
}

#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    id: PointId,
    latitude: f64,
    longitude: f64,
}

/// Small slack on cell-range arithmetic so boundary points are never missed.
const BOUNDARY_EPSILON_DEG: f64 = 1e-9;

/// Smallest cell edge; the row table is sized eagerly from it.
pub const MIN_CELL_SIZE_KM: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size_km: f64,
    row_height_deg: f64,
    cols_per_row: Vec<u32>,
    cells: HashMap<SpatialCell, Vec<IndexedPoint>>,
    len: usize,
}

impl SpatialIndex {
    /// Cell sizes below [`MIN_CELL_SIZE_KM`] (or NaN) are raised to it.
    pub fn new(cell_size_km: f64) -> Self {
        let cell_size_km = cell_size_km.max(MIN_CELL_SIZE_KM);
        let row_height_deg = (cell_size_km / KM_PER_DEGREE).min(180.0);
        let rows = ((180.0 / row_height_deg).ceil() as u32).max(1);

        let cols_per_row = (0..rows)
            .map(|row| {
                let lat_lo = -90.0 + f64::from(row) * row_height_deg;
                let lat_hi = (lat_lo + row_height_deg).min(90.0);
                let pole_most = lat_lo.abs().max(lat_hi.abs()).min(90.0);
                let circumference_km = 360.0 * KM_PER_DEGREE * pole_most.to_radians().cos();
                ((circumference_km / cell_size_km).floor() as u32).max(1)
            })
            .collect();

        Self { cell_size_km, row_height_deg, cols_per_row, cells: HashMap::new(), len: 0 }
    }

    /// Index whose cells are at least as large as the largest radius it will be
    /// queried with.
    pub fn for_max_radius(requested_cell_km: f64, max_radius_km: f64) -> Self {
        Self::new(requested_cell_km.max(max_radius_km))
    }

    pub fn cell_size_km(&self) -> f64 {
        self.cell_size_km
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn row_of(&self, latitude: f64) -> u32 {
        let last = self.cols_per_row.len() as u32 - 1;
        let row = ((latitude + 90.0) / self.row_height_deg).floor();
        if row <= 0.0 {
            0
        } else {
            (row as u32).min(last)
        }
    }

    fn col_width_deg(&self, row: u32) -> f64 {
        360.0 / f64::from(self.cols_per_row[row as usize])
    }

    /// Cell containing a coordinate.
    pub fn cell_of(&self, latitude: f64, longitude: f64) -> SpatialCell {
        let row = self.row_of(latitude);
        let cols = self.cols_per_row[row as usize];
        let col = ((longitude + 180.0) / self.col_width_deg(row)).floor();
        let col = if col <= 0.0 { 0 } else { (col as u32).min(cols - 1) };
        SpatialCell { row, col }
    }

    pub fn insert(&mut self, id: PointId, latitude: f64, longitude: f64) -> SpatialCell {
        let cell = self.cell_of(latitude, longitude);
        self.cells.entry(cell).or_default().push(IndexedPoint { id, latitude, longitude });
        self.len += 1;
        cell
    }

    /// Remove a point. The coordinates must be the ones it was inserted with.
    pub fn remove(&mut self, id: PointId, latitude: f64, longitude: f64) -> bool {
        let cell = self.cell_of(latitude, longitude);
        let Some(points) = self.cells.get_mut(&cell) else {
            return false;
        };
        let Some(pos) = points.iter().position(|p| p.id == id) else {
            return false;
        };
        points.swap_remove(pos);
        if points.is_empty() {
            self.cells.remove(&cell);
        }
        self.len -= 1;
        true
    }

    /// Every cell intersecting the circle of `radius_km` around the point.
    pub fn covering_cells(&self, latitude: f64, longitude: f64, radius_km: f64) -> Vec<SpatialCell> {
        let angular_radius = radius_km / EARTH_RADIUS_KM;
        let dlat = radius_km / KM_PER_DEGREE + BOUNDARY_EPSILON_DEG;
        let lat_min = latitude - dlat;
        let lat_max = latitude + dlat;
        let touches_pole = lat_min <= -90.0 || lat_max >= 90.0;

        // Longitude half-extent of a spherical cap that excludes both poles.
        let dlon = if touches_pole || angular_radius >= std::f64::consts::FRAC_PI_2 {
            None
        } else {
            let ratio = angular_radius.sin() / latitude.to_radians().cos();
            if ratio >= 1.0 {
                None
            } else {
                Some(ratio.asin().to_degrees() + BOUNDARY_EPSILON_DEG)
            }
        };

        let row_lo = self.row_of(lat_min.max(-90.0));
        let row_hi = self.row_of(lat_max.min(90.0));

        let mut cells = Vec::new();
        for row in row_lo..=row_hi {
            let cols = self.cols_per_row[row as usize];
            let full_row = |cells: &mut Vec<SpatialCell>| {
                cells.extend((0..cols).map(|col| SpatialCell { row, col }));
            };
            let Some(dlon) = dlon else {
                full_row(&mut cells);
                continue;
            };
            if dlon >= 180.0 {
                full_row(&mut cells);
                continue;
            }

            let width = self.col_width_deg(row);
            let c_lo = ((longitude - dlon + 180.0) / width).floor() as i64;
            let c_hi = ((longitude + dlon + 180.0) / width).floor() as i64;
            if c_hi - c_lo + 1 >= i64::from(cols) {
                full_row(&mut cells);
                continue;
            }
            for c in c_lo..=c_hi {
                let col = c.rem_euclid(i64::from(cols)) as u32;
                cells.push(SpatialCell { row, col });
            }
        }
        cells
    }

    /// Ids within `radius_km` of the point, with their distances, ascending by id.
    pub fn query_radius_with_distance(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Vec<(PointId, f64)> {
        let mut hits = Vec::new();
        for cell in self.covering_cells(latitude, longitude, radius_km) {
            let Some(points) = self.cells.get(&cell) else {
                continue;
            };
            for p in points {
                let d = haversine_km(latitude, longitude, p.latitude, p.longitude);
                if d <= radius_km {
                    hits.push((p.id, d));
                }
            }
        }
        hits.sort_unstable_by_key(|&(id, _)| id);
        hits.dedup_by_key(|&mut (id, _)| id);
        hits
    }

    /// Ids within `radius_km` of the point, ascending.
    pub fn query_radius(&self, latitude: f64, longitude: f64, radius_km: f64) -> Vec<PointId> {
        self.query_radius_with_distance(latitude, longitude, radius_km)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }
}
