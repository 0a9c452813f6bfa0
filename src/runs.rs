//! Run segmentation
//!
//! A run is a maximal contiguous subsequence of events whose sequence
//! indices differ by exactly 1 between neighbors. Adjacency is evaluated
//! within whatever filtered subset the caller passes in (a cluster, a
//! cluster∩day, ...), not against the full per-user stream: a gap means the
//! intervening events were window-filtered or assigned elsewhere.

use crate::types::GeoEvent;

/// Split an ordered event subset into maximal contiguous runs.
///
/// Input must already be sorted ascending by `sequence_index`. The first
/// event always opens a run; every later event either extends the current
/// run (`sequence_index == prev + 1`) or opens a new one. O(n) time,
/// stateless across calls.
pub fn segment_runs<'a>(events: &[&'a GeoEvent]) -> Vec<Vec<&'a GeoEvent>> {
    let mut runs: Vec<Vec<&GeoEvent>> = Vec::new();
    let mut prev_index: Option<u32> = None;

    for &event in events {
        let contiguous = matches!(prev_index, Some(prev) if event.sequence_index == prev + 1);
        if contiguous {
            if let Some(run) = runs.last_mut() {
                run.push(event);
            }
        } else {
            runs.push(vec![event]);
        }
        prev_index = Some(event.sequence_index);
    }

    runs
}
