//! Classification and output assembly
//!
//! Bridges feature records to the external classifier and reshapes its
//! per-row labels into the pipeline's output mapping.

use crate::encoding::EncodingTable;
use crate::error::PlacesError;
use crate::features::FeatureRecord;
use crate::normalizer::{finalize_matrix, raw_matrix, NormStats};
use crate::types::{PlaceSummary, PlacesByUser};

/// Minimum place radius in meters
pub const MIN_PLACE_RADIUS_METERS: f64 = 50.0;

/// External classifier collaborator.
///
/// Rows of the matrix are cluster feature vectors in
/// [`feature_columns`](crate::normalizer::feature_columns) order; the
/// classifier returns one category label per row, same order. The trained
/// model is loaded elsewhere; only prediction crosses this boundary.
pub trait PlaceClassifier {
    fn predict(&self, matrix: &[Vec<f64>]) -> Result<Vec<i64>, PlacesError>;
}

/// Normalize a batch of feature records, classify them, and reassemble the
/// labels into the per-user place mapping.
///
/// `encodings` and `stats` default to fitting on the batch itself when not
/// supplied. Cluster keys are `cluster1`, `cluster2`, ... per user, numbered
/// in record order (the order clusters were iterated, not their raw labels);
/// `radius` is the cluster's max member distance floored at
/// [`MIN_PLACE_RADIUS_METERS`]. An empty batch yields an empty mapping
/// without invoking the classifier.
pub fn predict_places(
    records: &[FeatureRecord],
    classifier: &dyn PlaceClassifier,
    encodings: Option<&EncodingTable>,
    stats: Option<&NormStats>,
) -> Result<PlacesByUser, PlacesError> {
    let mut places = PlacesByUser::new();
    if records.is_empty() {
        return Ok(places);
    }

    let fitted_encodings;
    let encodings = match encodings {
        Some(table) => table,
        None => {
            fitted_encodings = EncodingTable::fit(records);
            &fitted_encodings
        }
    };

    let mut matrix = raw_matrix(records, encodings);
    let fitted_stats;
    let stats = match stats {
        Some(stats) => stats,
        None => {
            fitted_stats = NormStats::fit(&matrix);
            &fitted_stats
        }
    };
    stats.apply(&mut matrix);
    let matrix = finalize_matrix(matrix);

    let labels = classifier.predict(&matrix)?;
    if labels.len() != records.len() {
        return Err(PlacesError::LabelCountMismatch {
            expected: records.len(),
            got: labels.len(),
        });
    }

    for (record, label) in records.iter().zip(labels) {
        let user_places = places
            .entry(format!("user_{}", record.user_id))
            .or_default();
        let cluster_key = format!("cluster{}", user_places.len() + 1);
        user_places.insert(
            cluster_key,
            PlaceSummary {
                lat: record.cluster_lat,
                lon: record.cluster_lon,
                radius: record.max_distance.max(MIN_PLACE_RADIUS_METERS),
                category: label,
            },
        );
    }

    Ok(places)
}
