//! Error types for GeoPlaces

use thiserror::Error;

/// Errors that can occur during a batch run
///
/// Expected filtering outcomes (too few events, missing day coverage) are not
/// errors; users failing those thresholds are silently excluded. Collaborator
/// failures fail the whole batch - there is no partial-result mode.
#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("Failed to parse input table: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("No profile row for user {0}")]
    MissingProfile(u64),

    #[error("Cluster {cluster_id} for user {user_id} has no member points")]
    EmptyCluster { user_id: u64, cluster_id: i32 },

    #[error("Clustering failed: {0}")]
    ClusteringFailed(String),

    #[error("Classifier failed: {0}")]
    ClassifierFailed(String),

    #[error("Classifier returned {got} labels for {expected} feature rows")]
    LabelCountMismatch { expected: usize, got: usize },
}
