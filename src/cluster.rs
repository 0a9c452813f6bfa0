//! Spatial clustering boundary
//!
//! The pipeline assigns each of a user's pings to a cluster through the
//! [`SpatialClusterer`] trait; label -1 marks unclustered noise and is
//! excluded from feature generation. [`GeoDbscan`] is the built-in
//! implementation: DBSCAN over a haversine (great-circle) metric, since
//! inputs are geographic coordinates.

use crate::error::PlacesError;
use std::collections::VecDeque;

/// Cluster label reserved for unclustered noise
pub const NOISE_CLUSTER: i32 = -1;

/// Kilometers per radian of central angle on the mean-radius sphere
pub const KM_PER_RADIAN: f64 = 6_371.0088;

/// Assigns a cluster label to each (lat, lon) point of one user.
///
/// Labels are dense non-negative integers, except [`NOISE_CLUSTER`] for
/// points in no cluster. A failure here is fatal for the whole batch.
pub trait SpatialClusterer {
    fn assign(&self, points: &[(f64, f64)]) -> Result<Vec<i32>, PlacesError>;
}

/// DBSCAN with a haversine distance metric.
///
/// `max_distance_km` is the neighborhood radius between two points of a
/// cluster, converted internally to radians of central angle; `min_samples`
/// counts the point itself.
#[derive(Debug, Clone)]
pub struct GeoDbscan {
    pub max_distance_km: f64,
    pub min_samples: usize,
}

/// Default neighborhood radius in kilometers
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 0.25;

/// Default minimum neighborhood size
pub const DEFAULT_MIN_SAMPLES: usize = 50;

impl Default for GeoDbscan {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DISTANCE_KM, DEFAULT_MIN_SAMPLES)
    }
}

impl GeoDbscan {
    pub fn new(max_distance_km: f64, min_samples: usize) -> Self {
        Self {
            max_distance_km,
            min_samples,
        }
    }

    /// Indices of all points within `eps` radians of `center`, including
    /// `center` itself.
    fn region_query(&self, points: &[(f64, f64)], center: usize, eps: f64) -> Vec<usize> {
        let origin = points[center];
        points
            .iter()
            .enumerate()
            .filter(|(_, &p)| haversine_angle(origin, p) <= eps)
            .map(|(i, _)| i)
            .collect()
    }
}

impl SpatialClusterer for GeoDbscan {
    fn assign(&self, points: &[(f64, f64)]) -> Result<Vec<i32>, PlacesError> {
        const UNVISITED: i32 = -2;

        let eps = self.max_distance_km / KM_PER_RADIAN;
        let mut labels = vec![UNVISITED; points.len()];
        let mut cluster: i32 = 0;

        for i in 0..points.len() {
            if labels[i] != UNVISITED {
                continue;
            }
            let neighbors = self.region_query(points, i, eps);
            if neighbors.len() < self.min_samples {
                labels[i] = NOISE_CLUSTER;
                continue;
            }

            labels[i] = cluster;
            let mut queue: VecDeque<usize> = neighbors.into();
            while let Some(j) = queue.pop_front() {
                if labels[j] == NOISE_CLUSTER {
                    // Border point previously marked noise joins the cluster
                    labels[j] = cluster;
                }
                if labels[j] != UNVISITED {
                    continue;
                }
                labels[j] = cluster;
                let expansion = self.region_query(points, j, eps);
                if expansion.len() >= self.min_samples {
                    queue.extend(expansion);
                }
            }
            cluster += 1;
        }

        Ok(labels)
    }
}

/// Haversine central angle in radians between two (lat, lon) points.
fn haversine_angle(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two tight groups ~30 km apart plus one far-away point
    fn two_group_points() -> Vec<(f64, f64)> {
        vec![
            (55.7500, 37.6100),
            (55.7501, 37.6101),
            (55.7502, 37.6099),
            (56.0000, 37.6100),
            (56.0001, 37.6101),
            (56.0002, 37.6099),
            (10.0000, 10.0000),
        ]
    }

    #[test]
    fn test_two_clusters_and_noise() {
        let clusterer = GeoDbscan::new(0.25, 3);
        let labels = clusterer.assign(&two_group_points()).unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
        assert_eq!(labels[6], NOISE_CLUSTER);
        assert!(labels[0] >= 0 && labels[3] >= 0);
    }

    #[test]
    fn test_min_samples_counts_the_point_itself() {
        let points = vec![(55.75, 37.61), (55.7501, 37.6101)];

        // A pair is enough when min_samples = 2
        let labels = GeoDbscan::new(0.25, 2).assign(&points).unwrap();
        assert_eq!(labels, vec![0, 0]);

        // But not when min_samples = 3
        let labels = GeoDbscan::new(0.25, 3).assign(&points).unwrap();
        assert_eq!(labels, vec![NOISE_CLUSTER, NOISE_CLUSTER]);
    }

    #[test]
    fn test_all_noise_below_density() {
        let clusterer = GeoDbscan::new(0.25, 50);
        let labels = clusterer.assign(&two_group_points()).unwrap();
        assert!(labels.iter().all(|&l| l == NOISE_CLUSTER));
    }

    #[test]
    fn test_empty_input() {
        let clusterer = GeoDbscan::default();
        let labels = clusterer.assign(&[]).unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_labels_are_dense_from_zero() {
        let clusterer = GeoDbscan::new(0.25, 3);
        let labels = clusterer.assign(&two_group_points()).unwrap();

        let max_label = labels.iter().copied().max().unwrap();
        assert_eq!(max_label, 1);
        for l in 0..=max_label {
            assert!(labels.contains(&l));
        }
    }

    #[test]
    fn test_deterministic_assignment() {
        let clusterer = GeoDbscan::new(0.25, 3);
        let points = two_group_points();
        let first = clusterer.assign(&points).unwrap();
        let second = clusterer.assign(&points).unwrap();
        assert_eq!(first, second);
    }
}
