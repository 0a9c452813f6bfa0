//! Geometric aggregation
//!
//! A cluster's representative point is the planar centroid of its member
//! pings (delegated to `geo`; the arithmetic mean of latitudes and of
//! longitudes, accepted as a model-input simplification). The cluster radius
//! comes from the maximum great-circle distance from any member to that
//! centroid.

use geo::{Centroid, MultiPoint, Point};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Planar centroid of a set of (lat, lon) points.
///
/// `None` only for an empty set.
pub fn centroid(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let multipoint: MultiPoint<f64> = points
        .iter()
        .map(|&(lat, lon)| Point::new(lat, lon))
        .collect::<Vec<_>>()
        .into();
    multipoint.centroid().map(|c| (c.x(), c.y()))
}

/// Great-circle distance in meters via the spherical law of cosines.
///
/// Floating-point rounding can push the acos argument slightly outside
/// [-1, 1] for near-identical or near-antipodal points; that case yields 0
/// rather than a domain fault.
pub fn surface_distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1) = (lat1.to_radians(), lon1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lon2.to_radians());

    let arg = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * (lon1 - lon2).cos();
    if !(-1.0..=1.0).contains(&arg) {
        return 0.0;
    }
    EARTH_RADIUS_METERS * arg.acos()
}

/// Maximum great-circle distance in meters from any point to the centroid.
pub fn max_distance_meters(points: &[(f64, f64)], center_lat: f64, center_lon: f64) -> f64 {
    let mut max_distance = 0.0_f64;
    for &(lat, lon) in points {
        let distance = surface_distance_meters(lat, lon, center_lat, center_lon);
        if distance > max_distance {
            max_distance = distance;
        }
    }
    max_distance
}
