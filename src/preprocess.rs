//! Event preprocessing
//!
//! Aligns timestamps to user-local time, trims each user's history to a
//! trailing 3-day window anchored at the first event, assigns a dense
//! per-user sequence index, and drops users that fail the density or
//! day-coverage thresholds. Dropped users disappear from both output tables.

use crate::types::{GeoEvent, RawGeoRecord, UserId, UserProfile};
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use std::collections::{BTreeMap, BTreeSet};

/// Default minimum event count for a user to be retained
pub const DEFAULT_MIN_EVENTS: usize = 50;

/// Length of the trailing window in calendar days
pub const WINDOW_DAYS: i64 = 3;

/// Number of distinct days a retained user's events must cover
pub const REQUIRED_ACTIVE_DAYS: usize = 3;

/// Preprocessor for the raw profile and event tables
pub struct Preprocessor {
    min_events: usize,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_EVENTS)
    }
}

impl Preprocessor {
    /// Create a preprocessor with a custom minimum event count
    pub fn new(min_events: usize) -> Self {
        Self { min_events }
    }

    /// Preprocess the raw tables into retained profiles and annotated events.
    ///
    /// Only users present in both tables are considered. Users are processed
    /// in ascending id order, so output row order is deterministic given
    /// identical inputs. Events for each retained user carry a contiguous
    /// 1-based `sequence_index` in chronological order.
    pub fn preprocess(
        &self,
        profiles: &[UserProfile],
        records: &[RawGeoRecord],
    ) -> (Vec<UserProfile>, Vec<GeoEvent>) {
        let offsets: BTreeMap<UserId, i64> = profiles
            .iter()
            .map(|p| (p.user_id, p.local_time_offset_minutes))
            .collect();

        let mut per_user: BTreeMap<UserId, Vec<&RawGeoRecord>> = BTreeMap::new();
        for record in records {
            if offsets.contains_key(&record.user_id) {
                per_user.entry(record.user_id).or_default().push(record);
            }
        }

        let mut events: Vec<GeoEvent> = Vec::new();
        let mut retained: BTreeSet<UserId> = BTreeSet::new();

        for (user_id, user_records) in &per_user {
            let offset = Duration::minutes(offsets[user_id]);
            let mut corrected: Vec<(NaiveDateTime, &RawGeoRecord)> = user_records
                .iter()
                .map(|r| (r.timestamp + offset, *r))
                .collect();
            // Stable sort keeps input row order for equal timestamps.
            corrected.sort_by_key(|(ts, _)| *ts);

            let anchor = match corrected.first() {
                Some((ts, _)) => *ts,
                None => continue,
            };
            // Trailing window: keep events strictly before anchor + 2 days.
            let window_end = anchor + Duration::days(WINDOW_DAYS - 1);
            corrected.retain(|(ts, _)| *ts < window_end);

            let days: BTreeSet<u32> = corrected.iter().map(|(ts, _)| ts.day()).collect();
            if corrected.len() < self.min_events || days.len() != REQUIRED_ACTIVE_DAYS {
                continue;
            }

            retained.insert(*user_id);
            for (i, (ts, record)) in corrected.iter().enumerate() {
                events.push(GeoEvent {
                    user_id: *user_id,
                    timestamp: *ts,
                    lat: record.lat,
                    lon: record.lon,
                    day: ts.day(),
                    hour: ts.hour(),
                    sequence_index: (i + 1) as u32,
                    source: record.source.clone(),
                    reason: record.reason.clone(),
                    is_charge: record.is_charge,
                });
            }
        }

        let profiles: Vec<UserProfile> = profiles
            .iter()
            .filter(|p| retained.contains(&p.user_id))
            .cloned()
            .collect();

        (profiles, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn profile(user_id: u64, offset_minutes: i64) -> UserProfile {
        UserProfile {
            user_id,
            age_bucket: "25-34".to_string(),
            locale: "ru".to_string(),
            device: "pixel-6".to_string(),
            local_time_offset_minutes: offset_minutes,
        }
    }

    fn record(user_id: u64, timestamp: NaiveDateTime) -> RawGeoRecord {
        RawGeoRecord {
            user_id,
            timestamp,
            lat: 55.75,
            lon: 37.61,
            source: "gsm".to_string(),
            reason: "periodic".to_string(),
            is_charge: false,
        }
    }

    /// Two records per day across three days
    fn three_day_records(user_id: u64) -> Vec<RawGeoRecord> {
        vec![
            record(user_id, ts(1, 8, 0)),
            record(user_id, ts(1, 9, 0)),
            record(user_id, ts(2, 8, 0)),
            record(user_id, ts(2, 9, 0)),
            record(user_id, ts(3, 7, 0)),
            record(user_id, ts(3, 7, 30)),
        ]
    }

    #[test]
    fn test_retained_user_has_contiguous_sequence() {
        let pre = Preprocessor::new(5);
        let (profiles, events) = pre.preprocess(&[profile(1, 0)], &three_day_records(1));

        assert_eq!(profiles.len(), 1);
        assert_eq!(events.len(), 6);
        let indices: Vec<u32> = events.iter().map(|e| e.sequence_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5, 6]);
        // Chronological order after sorting
        for pair in events.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn test_user_below_min_events_dropped() {
        let pre = Preprocessor::new(50);
        let (profiles, events) = pre.preprocess(&[profile(1, 0)], &three_day_records(1));

        assert!(profiles.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn test_user_missing_day_coverage_dropped() {
        let records = vec![
            record(1, ts(1, 8, 0)),
            record(1, ts(1, 9, 0)),
            record(1, ts(2, 8, 0)),
            record(1, ts(2, 9, 0)),
            record(1, ts(2, 10, 0)),
        ];
        let pre = Preprocessor::new(3);
        let (profiles, events) = pre.preprocess(&[profile(1, 0)], &records);

        // Only 2 distinct days: user and events gone entirely
        assert!(profiles.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn test_window_trims_events_past_two_days() {
        let mut records = three_day_records(1);
        // Event exactly at anchor + 2 days is dropped
        records.push(record(1, ts(3, 8, 0)));
        // Event well past the window is dropped
        records.push(record(1, ts(5, 8, 0)));

        let pre = Preprocessor::new(5);
        let (_, events) = pre.preprocess(&[profile(1, 0)], &records);

        assert_eq!(events.len(), 6);
        assert!(events.iter().all(|e| e.timestamp < ts(3, 8, 0)));
    }

    #[test]
    fn test_local_time_offset_applied() {
        // +180 minutes pushes a 22:30 ping into the next calendar day
        let records = vec![
            record(1, ts(1, 22, 30)),
            record(1, ts(2, 8, 0)),
            record(1, ts(2, 9, 0)),
            record(1, ts(3, 8, 0)),
            record(1, ts(3, 9, 0)),
        ];
        let pre = Preprocessor::new(5);
        let (profiles, events) = pre.preprocess(&[profile(1, 180)], &records);

        assert_eq!(profiles.len(), 1);
        assert_eq!(events[0].day, 2);
        assert_eq!(events[0].hour, 1);
    }

    #[test]
    fn test_user_absent_from_one_table_dropped() {
        let pre = Preprocessor::new(5);

        // Events without a profile row
        let (profiles, events) = pre.preprocess(&[], &three_day_records(1));
        assert!(profiles.is_empty());
        assert!(events.is_empty());

        // Profile without events
        let (profiles, events) = pre.preprocess(&[profile(2, 0)], &three_day_records(1));
        assert!(profiles.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn test_days_and_hours_annotated() {
        let pre = Preprocessor::new(5);
        let (_, events) = pre.preprocess(&[profile(1, 0)], &three_day_records(1));

        let days: Vec<u32> = events.iter().map(|e| e.day).collect();
        assert_eq!(days, vec![1, 1, 2, 2, 3, 3]);
        assert_eq!(events[0].hour, 8);
        assert_eq!(events[5].hour, 7);
    }
}
