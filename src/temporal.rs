//! Temporal aggregation over runs
//!
//! Three independent reductions over the runs of a caller-supplied event
//! subset (a cluster, a cluster∩day, a cluster∩charging-flag, ...): maximum
//! dwell time, run count, and median inter-event interval. All three apply
//! [`segment_runs`](crate::runs::segment_runs) internally.

use crate::runs::segment_runs;
use crate::types::GeoEvent;

/// Maximum dwell time in minutes over all runs of the subset.
///
/// Walks consecutive pairs within each run, accumulating inter-event deltas
/// into a running sum that resets at run boundaries. The maximum is tracked
/// after every step rather than per run total, so a non-monotonic anomaly in
/// the input ordering cannot hide an earlier peak. Result is floor-truncated;
/// an empty subset yields 0.
pub fn max_dwell_minutes(events: &[&GeoEvent]) -> i64 {
    let mut global_max = 0.0_f64;

    for run in segment_runs(events) {
        let mut local = 0.0_f64;
        for pair in run.windows(2) {
            local += minutes_between(pair[0], pair[1]);
            if local > global_max {
                global_max = local;
            }
        }
    }

    global_max as i64
}

/// Number of maximal runs in the subset ("connection sequences").
pub fn run_count(events: &[&GeoEvent]) -> u32 {
    segment_runs(events).len() as u32
}

/// Median inter-event interval in minutes across the subset.
///
/// Collects every consecutive intra-run delta (each run's first event
/// contributes none) into one pooled collection and returns its median.
/// `None` when the subset yields zero deltas; callers coerce that to 0 at
/// normalization time.
pub fn median_interval_minutes(events: &[&GeoEvent]) -> Option<f64> {
    let mut deltas: Vec<f64> = Vec::new();
    for run in segment_runs(events) {
        for pair in run.windows(2) {
            deltas.push(minutes_between(pair[0], pair[1]));
        }
    }
    median(&mut deltas)
}

fn minutes_between(earlier: &GeoEvent, later: &GeoEvent) -> f64 {
    (later.timestamp - earlier.timestamp).num_seconds() as f64 / 60.0
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
