//! Core data types for the place-finding pipeline
//!
//! Raw table rows come in as [`UserProfile`] and [`RawGeoRecord`];
//! preprocessing turns records into [`GeoEvent`]s, clustering attaches a
//! label to make [`ClusteredEvent`]s, and the prediction adapter emits a
//! [`PlacesByUser`] mapping.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// User identifier shared by the profile and event tables
pub type UserId = u64;

/// One row of the user profile table
///
/// The source tables guarantee exactly one row per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// User identifier
    pub user_id: UserId,
    /// Age bucket label (categorical, not a number)
    pub age_bucket: String,
    /// Locale code
    pub locale: String,
    /// Device model label
    pub device: String,
    /// Minutes added to raw timestamps to obtain the user's local time
    pub local_time_offset_minutes: i64,
}

/// One row of the raw geolocation event table
///
/// Timestamps are zone-less and uncorrected; the per-user offset from
/// [`UserProfile`] is applied during preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGeoRecord {
    /// User identifier
    pub user_id: UserId,
    /// Raw (uncorrected) timestamp
    pub timestamp: NaiveDateTime,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Connectivity source that produced the ping (e.g. "wifi", "gsm")
    pub source: String,
    /// Reason the ping was recorded
    pub reason: String,
    /// Whether the device was charging
    #[serde(default)]
    pub is_charge: bool,
}

/// A preprocessed geolocation event
///
/// `sequence_index` is a dense, 1-based ordinal assigned once per user over
/// the trimmed 3-day window, in chronological order. It is the sole
/// contiguity signal used downstream: a gap among a cluster's members means
/// intervening events were filtered out or assigned elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoEvent {
    /// User identifier
    pub user_id: UserId,
    /// Local-time-corrected timestamp
    pub timestamp: NaiveDateTime,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Calendar day-of-month component of the corrected timestamp
    pub day: u32,
    /// Hour-of-day component of the corrected timestamp (0-23)
    pub hour: u32,
    /// Dense per-user ordinal, 1-based, assigned after window trimming
    pub sequence_index: u32,
    /// Connectivity source
    pub source: String,
    /// Recording reason
    pub reason: String,
    /// Whether the device was charging
    pub is_charge: bool,
}

/// A preprocessed event with its spatial cluster label attached
///
/// `cluster_id` of -1 marks unclustered noise and never produces features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteredEvent {
    /// The underlying event
    pub event: GeoEvent,
    /// Cluster label assigned by the spatial clusterer (-1 = noise)
    pub cluster_id: i32,
}

/// A labeled place returned by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSummary {
    /// Cluster centroid latitude
    pub lat: f64,
    /// Cluster centroid longitude
    pub lon: f64,
    /// Place radius in meters (max member distance, floored at 50)
    pub radius: f64,
    /// Category label produced by the classifier
    pub category: i64,
}

/// Places for one user, keyed `cluster1`, `cluster2`, ... in cluster
/// iteration order
pub type UserPlaces = BTreeMap<String, PlaceSummary>;

/// Full batch output, keyed `user_<id>`
pub type PlacesByUser = BTreeMap<String, UserPlaces>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_record_deserialization() {
        let json = r#"{
            "user_id": 7,
            "timestamp": "2021-03-01T08:30:00",
            "lat": 55.75,
            "lon": 37.61,
            "source": "wifi",
            "reason": "periodic",
            "is_charge": true
        }"#;

        let record: RawGeoRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.user_id, 7);
        assert_eq!(record.source, "wifi");
        assert!(record.is_charge);
    }

    #[test]
    fn test_is_charge_defaults_to_false() {
        let json = r#"{
            "user_id": 1,
            "timestamp": "2021-03-01T08:30:00",
            "lat": 0.0,
            "lon": 0.0,
            "source": "gsm",
            "reason": "push"
        }"#;

        let record: RawGeoRecord = serde_json::from_str(json).unwrap();
        assert!(!record.is_charge);
    }

    #[test]
    fn test_profile_roundtrip() {
        let profile = UserProfile {
            user_id: 42,
            age_bucket: "25-34".to_string(),
            locale: "ru".to_string(),
            device: "pixel-6".to_string(),
            local_time_offset_minutes: 180,
        };

        let json = serde_json::to_string(&profile).unwrap();
        let parsed: UserProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.user_id, 42);
        assert_eq!(parsed.local_time_offset_minutes, 180);
    }
}
