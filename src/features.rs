//! Cluster feature building
//!
//! For every retained user and every non-noise cluster, assembles one flat
//! [`FeatureRecord`] combining temporal aggregates (global, per-day, and
//! restricted to charging / Wi-Fi events), the hourly point histogram,
//! categorical attributes, and cluster geometry.

use crate::cluster::NOISE_CLUSTER;
use crate::error::PlacesError;
use crate::geometry;
use crate::temporal::{max_dwell_minutes, median_interval_minutes, run_count};
use crate::types::{ClusteredEvent, GeoEvent, UserId, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source value marking a ping recorded over Wi-Fi connectivity
pub const WIFI_SOURCE: &str = "wifi";

/// Hour slots in the per-hour histogram
pub const HOURS_PER_DAY: usize = 24;

/// Day slots in the per-day feature fields
pub const DAY_SLOTS: usize = 3;

/// Feature vector for one (user, cluster) pair.
///
/// Day slots are filled in the order days are first encountered in the
/// cluster; slots for absent days hold explicit zeros. A present day whose
/// median interval is undefined (no intra-run deltas) holds `None`, which is
/// zero-filled only after normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub user_id: UserId,
    pub cluster_id: i32,
    /// Cluster centroid latitude
    pub cluster_lat: f64,
    /// Cluster centroid longitude
    pub cluster_lon: f64,
    /// Max dwell in minutes over the whole cluster
    pub max_time_in_zone: i64,
    /// Max dwell per day slot
    pub time_day: [i64; DAY_SLOTS],
    /// Median inter-event interval per day slot
    pub request_freq_day: [Option<f64>; DAY_SLOTS],
    /// Median inter-event interval over the whole cluster
    pub request_freq: Option<f64>,
    pub age: String,
    pub locale: String,
    pub device: String,
    /// Event count per hour of day
    pub points_in_hour: [u32; HOURS_PER_DAY],
    /// Most frequent recording reason (ties break to the smallest value)
    pub top_reason: String,
    /// Most frequent connectivity source (ties break to the smallest value)
    pub top_source: String,
    /// Max dwell restricted to charging events
    pub charge_time: i64,
    /// Run count restricted to charging events
    pub charge_connections: u32,
    /// Max dwell restricted to Wi-Fi events
    pub wifi_time: i64,
    /// Run count restricted to Wi-Fi events
    pub wifi_connections: u32,
    /// Most frequent hour of day (ties break to the smallest hour)
    pub hour_mode: u32,
    /// Max great-circle distance from any member to the centroid, meters
    pub max_distance: f64,
}

/// Build one feature record per (user, cluster ≠ noise).
///
/// Users are visited in ascending id order; within a user, clusters in the
/// order their labels first appear in the event stream. That iteration order
/// also defines the per-user cluster keys assigned by the prediction adapter.
pub fn build_feature_records(
    profiles: &[UserProfile],
    clustered: &[ClusteredEvent],
) -> Result<Vec<FeatureRecord>, PlacesError> {
    let profile_by_user: BTreeMap<UserId, &UserProfile> =
        profiles.iter().map(|p| (p.user_id, p)).collect();

    let mut per_user: BTreeMap<UserId, Vec<&ClusteredEvent>> = BTreeMap::new();
    for ce in clustered {
        per_user.entry(ce.event.user_id).or_default().push(ce);
    }

    let mut records: Vec<FeatureRecord> = Vec::new();
    for (user_id, user_events) in &per_user {
        let profile = profile_by_user
            .get(user_id)
            .ok_or(PlacesError::MissingProfile(*user_id))?;

        let mut cluster_order: Vec<i32> = Vec::new();
        for ce in user_events {
            if !cluster_order.contains(&ce.cluster_id) {
                cluster_order.push(ce.cluster_id);
            }
        }

        for cluster_id in cluster_order {
            if cluster_id == NOISE_CLUSTER {
                continue;
            }
            let mut members: Vec<&GeoEvent> = user_events
                .iter()
                .filter(|ce| ce.cluster_id == cluster_id)
                .map(|ce| &ce.event)
                .collect();
            members.sort_by_key(|e| e.sequence_index);

            records.push(build_record(profile, cluster_id, &members)?);
        }
    }

    Ok(records)
}

fn build_record(
    profile: &UserProfile,
    cluster_id: i32,
    members: &[&GeoEvent],
) -> Result<FeatureRecord, PlacesError> {
    let points: Vec<(f64, f64)> = members.iter().map(|e| (e.lat, e.lon)).collect();
    let (cluster_lat, cluster_lon) =
        geometry::centroid(&points).ok_or(PlacesError::EmptyCluster {
            user_id: profile.user_id,
            cluster_id,
        })?;

    // Day slots in first-encounter order; untouched slots stay at zero.
    let mut time_day = [0_i64; DAY_SLOTS];
    let mut request_freq_day: [Option<f64>; DAY_SLOTS] = [Some(0.0); DAY_SLOTS];
    let mut seen_days: Vec<u32> = Vec::new();
    for e in members {
        if !seen_days.contains(&e.day) {
            seen_days.push(e.day);
        }
    }
    for (slot, day) in seen_days.iter().take(DAY_SLOTS).enumerate() {
        let day_events: Vec<&GeoEvent> =
            members.iter().copied().filter(|e| e.day == *day).collect();
        time_day[slot] = max_dwell_minutes(&day_events);
        request_freq_day[slot] = median_interval_minutes(&day_events);
    }

    let mut points_in_hour = [0_u32; HOURS_PER_DAY];
    for e in members {
        points_in_hour[e.hour as usize % HOURS_PER_DAY] += 1;
    }

    let charge_events: Vec<&GeoEvent> = members.iter().copied().filter(|e| e.is_charge).collect();
    let wifi_events: Vec<&GeoEvent> = members
        .iter()
        .copied()
        .filter(|e| e.source == WIFI_SOURCE)
        .collect();

    Ok(FeatureRecord {
        user_id: profile.user_id,
        cluster_id,
        cluster_lat,
        cluster_lon,
        max_time_in_zone: max_dwell_minutes(members),
        time_day,
        request_freq_day,
        request_freq: median_interval_minutes(members),
        age: profile.age_bucket.clone(),
        locale: profile.locale.clone(),
        device: profile.device.clone(),
        points_in_hour,
        top_reason: mode(members.iter().map(|e| e.reason.as_str()))
            .unwrap_or_default()
            .to_string(),
        top_source: mode(members.iter().map(|e| e.source.as_str()))
            .unwrap_or_default()
            .to_string(),
        charge_time: max_dwell_minutes(&charge_events),
        charge_connections: run_count(&charge_events),
        wifi_time: max_dwell_minutes(&wifi_events),
        wifi_connections: run_count(&wifi_events),
        hour_mode: mode(members.iter().map(|e| e.hour)).unwrap_or(0),
        max_distance: geometry::max_distance_meters(&points, cluster_lat, cluster_lon),
    })
}

/// Most frequent value; ties break to the smallest under natural ordering.
fn mode<T: Ord>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut best: Option<(T, usize)> = None;
    for (value, count) in counts {
        // Strict > over ascending keys keeps the smallest value on ties
        match &best {
            Some((_, best_count)) if count <= *best_count => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn profile(user_id: u64) -> UserProfile {
        UserProfile {
            user_id,
            age_bucket: "25-34".to_string(),
            locale: "ru".to_string(),
            device: "pixel-6".to_string(),
            local_time_offset_minutes: 0,
        }
    }

    fn event(minute_offset: i64, sequence_index: u32) -> GeoEvent {
        let timestamp = base_time() + chrono::Duration::minutes(minute_offset);
        GeoEvent {
            user_id: 1,
            timestamp,
            lat: 55.75,
            lon: 37.61,
            day: chrono::Datelike::day(&timestamp),
            hour: chrono::Timelike::hour(&timestamp),
            sequence_index,
            source: "gsm".to_string(),
            reason: "periodic".to_string(),
            is_charge: false,
        }
    }

    fn clustered(event: GeoEvent, cluster_id: i32) -> ClusteredEvent {
        ClusteredEvent { event, cluster_id }
    }

    #[test]
    fn test_noise_cluster_produces_no_record() {
        let events = vec![
            clustered(event(0, 1), NOISE_CLUSTER),
            clustered(event(5, 2), NOISE_CLUSTER),
        ];
        let records = build_feature_records(&[profile(1)], &events).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_single_day_cluster_zeroes_other_day_slots() {
        let events = vec![
            clustered(event(0, 1), 0),
            clustered(event(10, 2), 0),
            clustered(event(20, 3), 0),
        ];
        let records = build_feature_records(&[profile(1)], &events).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.time_day[0], 20);
        assert_eq!(record.time_day[1], 0);
        assert_eq!(record.time_day[2], 0);
        assert_eq!(record.request_freq_day[0], Some(10.0));
        assert_eq!(record.request_freq_day[1], Some(0.0));
        assert_eq!(record.request_freq_day[2], Some(0.0));
    }

    #[test]
    fn test_undefined_day_median_stays_missing() {
        // Two singleton runs: day present but no intra-run deltas
        let events = vec![clustered(event(0, 1), 0), clustered(event(10, 5), 0)];
        let records = build_feature_records(&[profile(1)], &events).unwrap();

        assert_eq!(records[0].request_freq_day[0], None);
        assert_eq!(records[0].request_freq, None);
    }

    #[test]
    fn test_hour_histogram_counts_cluster_events() {
        let events = vec![
            clustered(event(0, 1), 0),   // 08:00
            clustered(event(30, 2), 0),  // 08:30
            clustered(event(70, 3), 0),  // 09:10
        ];
        let records = build_feature_records(&[profile(1)], &events).unwrap();

        let record = &records[0];
        assert_eq!(record.points_in_hour[8], 2);
        assert_eq!(record.points_in_hour[9], 1);
        assert_eq!(record.points_in_hour.iter().sum::<u32>(), 3);
        assert_eq!(record.hour_mode, 8);
    }

    #[test]
    fn test_top_fields_use_mode_with_smallest_tiebreak() {
        let mut a = event(0, 1);
        a.reason = "push".to_string();
        let mut b = event(5, 2);
        b.reason = "geo".to_string();
        // One of each: tie breaks to "geo" (lexicographically smaller)
        let events = vec![clustered(a, 0), clustered(b, 0)];
        let records = build_feature_records(&[profile(1)], &events).unwrap();

        assert_eq!(records[0].top_reason, "geo");
        assert_eq!(records[0].top_source, "gsm");
    }

    #[test]
    fn test_charge_and_wifi_subsets() {
        let mut a = event(0, 1);
        a.is_charge = true;
        let mut b = event(10, 2);
        b.is_charge = true;
        let mut c = event(20, 3);
        c.source = "wifi".to_string();
        let mut d = event(25, 4);
        d.source = "wifi".to_string();

        let events = vec![
            clustered(a, 0),
            clustered(b, 0),
            clustered(c, 0),
            clustered(d, 0),
        ];
        let records = build_feature_records(&[profile(1)], &events).unwrap();

        let record = &records[0];
        // Charging events at indices 1,2 form one run dwelling 10 minutes
        assert_eq!(record.charge_time, 10);
        assert_eq!(record.charge_connections, 1);
        // Wi-Fi events at indices 3,4 form one run dwelling 5 minutes
        assert_eq!(record.wifi_time, 5);
        assert_eq!(record.wifi_connections, 1);
    }

    #[test]
    fn test_clusters_emitted_in_first_appearance_order() {
        let mut far = event(30, 3);
        far.lat = 56.0;
        let events = vec![
            clustered(event(0, 1), 1),
            clustered(event(10, 2), 0),
            clustered(far, 1),
        ];
        let records = build_feature_records(&[profile(1)], &events).unwrap();

        let ids: Vec<i32> = records.iter().map(|r| r.cluster_id).collect();
        assert_eq!(ids, vec![1, 0]);
    }

    #[test]
    fn test_missing_profile_is_an_error() {
        let events = vec![clustered(event(0, 1), 0)];
        let result = build_feature_records(&[], &events);
        assert!(matches!(result, Err(PlacesError::MissingProfile(1))));
    }

    #[test]
    fn test_profile_attributes_copied() {
        let events = vec![clustered(event(0, 1), 0)];
        let records = build_feature_records(&[profile(1)], &events).unwrap();

        let record = &records[0];
        assert_eq!(record.age, "25-34");
        assert_eq!(record.locale, "ru");
        assert_eq!(record.device, "pixel-6");
    }

    #[test]
    fn test_geometry_fields() {
        let mut b = event(10, 2);
        b.lat = 55.76;
        let events = vec![clustered(event(0, 1), 0), clustered(b, 0)];
        let records = build_feature_records(&[profile(1)], &events).unwrap();

        let record = &records[0];
        assert!((record.cluster_lat - 55.755).abs() < 1e-9);
        assert!((record.cluster_lon - 37.61).abs() < 1e-9);
        assert!(record.max_distance > 0.0);
    }
}
