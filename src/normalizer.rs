//! Feature normalization
//!
//! Assembles feature records into a numeric matrix with a fixed column
//! order, z-score normalizes an enumerated column subset, and zero-fills
//! whatever is still missing afterwards. Normalization statistics live in
//! [`NormStats`], a versioned per-column (mean, std) table that can be fit
//! from the inference batch or computed once at training time, persisted as
//! JSON, and passed back in - so inference does not silently depend on the
//! batch's own distribution.

use crate::encoding::EncodingTable;
use crate::features::{FeatureRecord, DAY_SLOTS, HOURS_PER_DAY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Classifier matrix columns, in order.
///
/// This is the exact column order the classifier was trained on. The
/// identifying and geometric fields (`user_id`, `cluster_id`, `cluster_lat`,
/// `cluster_lon`, `max_distance`) never enter the matrix, and neither do the
/// charge fields; `is_points_in_H` duplicates `points_in_H` because the
/// trained model expects both.
pub fn feature_columns() -> Vec<String> {
    let mut columns = vec!["max_time_in_zone".to_string()];
    for day in 1..=DAY_SLOTS {
        columns.push(format!("time_day{day}"));
        columns.push(format!("request_freq_{day}"));
    }
    columns.push("request_freq".to_string());
    columns.push("age".to_string());
    columns.push("locale".to_string());
    for hour in 0..HOURS_PER_DAY {
        columns.push(format!("is_points_in_{hour}"));
        columns.push(format!("points_in_{hour}"));
    }
    columns.push("top_reason".to_string());
    columns.push("top_source".to_string());
    columns.push("wifi_time".to_string());
    columns.push("wifi_connections".to_string());
    columns.push("hour_mode".to_string());
    columns.push("device".to_string());
    columns
}

/// Columns subject to z-score normalization.
pub fn normalized_columns() -> Vec<String> {
    let mut columns = vec!["max_time_in_zone".to_string(), "request_freq".to_string()];
    for day in 1..=DAY_SLOTS {
        columns.push(format!("time_day{day}"));
        columns.push(format!("request_freq_{day}"));
    }
    for hour in 0..HOURS_PER_DAY {
        columns.push(format!("points_in_{hour}"));
    }
    columns.push("wifi_time".to_string());
    columns.push("wifi_connections".to_string());
    columns
}

/// Raw matrix cell for one record and column; `None` marks an undefined
/// statistic that is zero-filled only after normalization.
fn cell(record: &FeatureRecord, column: &str, table: &EncodingTable) -> Option<f64> {
    if let Some(hour) = column.strip_prefix("is_points_in_") {
        let hour: usize = hour.parse().ok()?;
        return Some(f64::from(record.points_in_hour[hour]));
    }
    if let Some(hour) = column.strip_prefix("points_in_") {
        let hour: usize = hour.parse().ok()?;
        return Some(f64::from(record.points_in_hour[hour]));
    }
    if let Some(day) = column.strip_prefix("time_day") {
        let day: usize = day.parse().ok()?;
        return Some(record.time_day[day - 1] as f64);
    }
    if let Some(day) = column.strip_prefix("request_freq_") {
        let day: usize = day.parse().ok()?;
        return record.request_freq_day[day - 1];
    }
    match column {
        "max_time_in_zone" => Some(record.max_time_in_zone as f64),
        "request_freq" => record.request_freq,
        "age" => Some(table.age.code(&record.age) as f64),
        "locale" => Some(table.locale.code(&record.locale) as f64),
        "top_reason" => Some(table.top_reason.code(&record.top_reason) as f64),
        "top_source" => Some(table.top_source.code(&record.top_source) as f64),
        "device" => Some(table.device.code(&record.device) as f64),
        "wifi_time" => Some(record.wifi_time as f64),
        "wifi_connections" => Some(f64::from(record.wifi_connections)),
        "hour_mode" => Some(f64::from(record.hour_mode)),
        _ => None,
    }
}

/// Assemble the raw (pre-normalization) matrix in [`feature_columns`] order.
pub fn raw_matrix(records: &[FeatureRecord], table: &EncodingTable) -> Vec<Vec<Option<f64>>> {
    let columns = feature_columns();
    records
        .iter()
        .map(|r| columns.iter().map(|c| cell(r, c, table)).collect())
        .collect()
}

/// Per-column normalization statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub mean: f64,
    /// Sample standard deviation; 0.0 marks a degenerate column
    pub std: f64,
}

/// Versioned z-score statistics for the normalized column subset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormStats {
    /// Statistics layout version, bumped when the column set changes
    pub version: u32,
    pub columns: BTreeMap<String, ColumnStats>,
}

impl NormStats {
    /// Current statistics layout version
    pub const VERSION: u32 = 1;

    /// Fit statistics from a raw matrix, one entry per normalized column.
    ///
    /// Missing cells are excluded from both mean and std. A column with
    /// fewer than two present values, or zero spread, is stored with
    /// `std = 0.0` and later normalizes to 0.
    pub fn fit(matrix: &[Vec<Option<f64>>]) -> Self {
        let columns = feature_columns();
        let mut stats = BTreeMap::new();

        for name in normalized_columns() {
            let index = match columns.iter().position(|c| c == &name) {
                Some(i) => i,
                None => continue,
            };
            let values: Vec<f64> = matrix.iter().filter_map(|row| row[index]).collect();
            stats.insert(name, column_stats(&values));
        }

        Self {
            version: Self::VERSION,
            columns: stats,
        }
    }

    /// Z-score every cell of a column with known statistics.
    ///
    /// Degenerate columns collapse to 0; missing cells stay missing and are
    /// handled by [`finalize_matrix`].
    pub fn apply(&self, matrix: &mut [Vec<Option<f64>>]) {
        let columns = feature_columns();
        for (index, name) in columns.iter().enumerate() {
            let Some(stats) = self.columns.get(name) else {
                continue;
            };
            for row in matrix.iter_mut() {
                row[index] = row[index].map(|x| {
                    if stats.std > 0.0 && stats.std.is_finite() {
                        (x - stats.mean) / stats.std
                    } else {
                        0.0
                    }
                });
            }
        }
    }

    /// Load persisted statistics from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize statistics to JSON for persistence
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn column_stats(values: &[f64]) -> ColumnStats {
    if values.len() < 2 {
        return ColumnStats {
            mean: values.first().copied().unwrap_or(0.0),
            std: 0.0,
        };
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    ColumnStats {
        mean,
        std: variance.sqrt(),
    }
}

/// Replace remaining missing cells with 0 and drop the `Option` layer.
pub fn finalize_matrix(matrix: Vec<Vec<Option<f64>>>) -> Vec<Vec<f64>> {
    matrix
        .into_iter()
        .map(|row| row.into_iter().map(|c| c.unwrap_or(0.0)).collect())
        .collect()
}
