//! Spherical geometry helpers: great-circle distance and pole-safe centroids.

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Length of one degree of latitude (and of longitude at the equator) in km.
pub const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

/// Great-circle distance between two points given in decimal degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_KM * c
}

/// Unit vector on the sphere for a (lat, lon) pair in degrees.
pub fn to_unit_vector(lat: f64, lon: f64) -> [f64; 3] {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Centroid of a set of points as the normalized mean of their unit vectors.
///
/// Averaging vectors instead of degrees keeps clusters that straddle the
/// antimeridian or sit near a pole in the right place. Returns `None` for an
/// empty input or when the vectors cancel out (antipodal points).
pub fn spherical_centroid<I>(points: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut sum = [0.0f64; 3];
    let mut count = 0usize;
    for (lat, lon) in points {
        let v = to_unit_vector(lat, lon);
        sum[0] += v[0];
        sum[1] += v[1];
        sum[2] += v[2];
        count += 1;
    }
    if count == 0 {
        return None;
    }

    let norm = (sum[0] * sum[0] + sum[1] * sum[1] + sum[2] * sum[2]).sqrt();
    if norm < 1e-12 {
        return None;
    }

    let lat = (sum[2] / norm).clamp(-1.0, 1.0).asin().to_degrees();
    let lon = sum[1].atan2(sum[0]).to_degrees();
    Some((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distances() {
        assert!(haversine_km(40.0, 15.0, 40.0, 15.0).abs() < 1e-9);
        // One degree of latitude
        let d = haversine_km(40.0, 15.0, 41.0, 15.0);
        assert!((d - KM_PER_DEGREE).abs() < 1e-6);
        // Rome to Naples is roughly 190 km
        let d = haversine_km(41.9028, 12.4964, 40.8518, 14.2681);
        assert!(d > 180.0 && d < 200.0, "got {}", d);
    }

    #[test]
    fn test_haversine_across_antimeridian() {
        let d = haversine_km(0.0, 179.95, 0.0, -179.95);
        assert!((d - 0.1 * KM_PER_DEGREE).abs() < 1e-6);
    }

    #[test]
    fn test_centroid_single_point() {
        let (lat, lon) = spherical_centroid([(40.0, 15.0)]).unwrap();
        assert!((lat - 40.0).abs() < 1e-9);
        assert!((lon - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_centroid_straddles_antimeridian() {
        let (lat, lon) = spherical_centroid([(10.0, 179.0), (10.0, -179.0)]).unwrap();
        assert!((lat - 10.0).abs() < 0.01);
        assert!((lon.abs() - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_centroid_empty_or_antipodal() {
        assert!(spherical_centroid(std::iter::empty()).is_none());
        assert!(spherical_centroid([(0.0, 0.0), (0.0, 180.0)]).is_none());
    }
}
