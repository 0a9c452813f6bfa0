//! Pipeline orchestration
//!
//! [`PlaceFinder`] wires the stages together: preprocessing, per-user
//! spatial clustering, feature building, and normalization + classification.
//! Collaborators are injected through the [`SpatialClusterer`] and
//! [`PlaceClassifier`] traits; [`find_places`] is the convenience entry point
//! with the built-in DBSCAN.

use crate::cluster::{
    GeoDbscan, SpatialClusterer, DEFAULT_MAX_DISTANCE_KM, DEFAULT_MIN_SAMPLES,
};
use crate::encoding::EncodingTable;
use crate::error::PlacesError;
use crate::features::{build_feature_records, FeatureRecord};
use crate::normalizer::NormStats;
use crate::predict::{predict_places, PlaceClassifier};
use crate::preprocess::{Preprocessor, DEFAULT_MIN_EVENTS};
use crate::types::{ClusteredEvent, GeoEvent, PlacesByUser, RawGeoRecord, UserId, UserProfile};
use std::collections::BTreeMap;

/// Tunables for the preprocessing and clustering stages
#[derive(Debug, Clone)]
pub struct PlacesConfig {
    /// Minimum events a user must retain in the window
    pub min_events: usize,
    /// DBSCAN neighborhood radius in kilometers
    pub max_distance_km: f64,
    /// DBSCAN minimum neighborhood size, counting the point itself
    pub min_samples: usize,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            min_events: DEFAULT_MIN_EVENTS,
            max_distance_km: DEFAULT_MAX_DISTANCE_KM,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

/// Batch processor turning raw tables into a per-user place mapping.
///
/// Encoding and normalization tables default to being fitted on each batch;
/// install persisted tables with [`with_encodings`](Self::with_encodings) and
/// [`with_norm_stats`](Self::with_norm_stats) to keep codes and scales stable
/// across batches.
pub struct PlaceFinder<C: SpatialClusterer, M: PlaceClassifier> {
    clusterer: C,
    classifier: M,
    config: PlacesConfig,
    encodings: Option<EncodingTable>,
    norm_stats: Option<NormStats>,
}

impl<C: SpatialClusterer, M: PlaceClassifier> PlaceFinder<C, M> {
    pub fn new(clusterer: C, classifier: M) -> Self {
        Self {
            clusterer,
            classifier,
            config: PlacesConfig::default(),
            encodings: None,
            norm_stats: None,
        }
    }

    pub fn with_config(mut self, config: PlacesConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_encodings(mut self, encodings: EncodingTable) -> Self {
        self.encodings = Some(encodings);
        self
    }

    pub fn with_norm_stats(mut self, stats: NormStats) -> Self {
        self.norm_stats = Some(stats);
        self
    }

    /// Run the full pipeline over one batch.
    pub fn find_places(
        &self,
        profiles: &[UserProfile],
        records: &[RawGeoRecord],
    ) -> Result<PlacesByUser, PlacesError> {
        let features = self.feature_records(profiles, records)?;
        predict_places(
            &features,
            &self.classifier,
            self.encodings.as_ref(),
            self.norm_stats.as_ref(),
        )
    }

    /// Run stages 1-3 only: preprocess, cluster, and build feature records.
    pub fn feature_records(
        &self,
        profiles: &[UserProfile],
        records: &[RawGeoRecord],
    ) -> Result<Vec<FeatureRecord>, PlacesError> {
        let preprocessor = Preprocessor::new(self.config.min_events);
        let (retained_profiles, events) = preprocessor.preprocess(profiles, records);
        let clustered = self.cluster_events(events)?;
        build_feature_records(&retained_profiles, &clustered)
    }

    /// Cluster each user's events independently.
    fn cluster_events(&self, events: Vec<GeoEvent>) -> Result<Vec<ClusteredEvent>, PlacesError> {
        let mut per_user: BTreeMap<UserId, Vec<GeoEvent>> = BTreeMap::new();
        for event in events {
            per_user.entry(event.user_id).or_default().push(event);
        }

        let mut clustered: Vec<ClusteredEvent> = Vec::new();
        for (_, user_events) in per_user {
            let points: Vec<(f64, f64)> = user_events.iter().map(|e| (e.lat, e.lon)).collect();
            let labels = self.clusterer.assign(&points)?;
            for (event, cluster_id) in user_events.into_iter().zip(labels) {
                clustered.push(ClusteredEvent { event, cluster_id });
            }
        }
        Ok(clustered)
    }
}

/// Run the pipeline with the built-in [`GeoDbscan`] and default config.
pub fn find_places<M: PlaceClassifier>(
    profiles: &[UserProfile],
    records: &[RawGeoRecord],
    classifier: M,
) -> Result<PlacesByUser, PlacesError> {
    PlaceFinder::new(GeoDbscan::default(), classifier).find_places(profiles, records)
}
