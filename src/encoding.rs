//! Categorical encoding
//!
//! The classifier consumes numeric matrices, so categorical text fields
//! (`top_reason`, `top_source`, `device`, `age`, `locale`) are mapped to
//! small integer codes. Codes are the lexicographic rank of the value within
//! the fitted vocabulary, so a table fitted on the same value set always
//! produces the same codes. Fit once at training time, persist as JSON, and
//! reload per batch to keep encodings stable across runs; fitting from the
//! inference batch itself is the fallback.

use crate::features::FeatureRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Code returned for values absent from the fitted vocabulary
pub const UNSEEN_CODE: i64 = -1;

/// Stable string→code mapping for one categorical column
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryEncoder {
    codes: BTreeMap<String, i64>,
}

impl CategoryEncoder {
    /// Fit a vocabulary; codes are assigned by ascending lexicographic order.
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let unique: BTreeSet<&str> = values.into_iter().collect();
        let codes = unique
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v.to_string(), i as i64))
            .collect();
        Self { codes }
    }

    /// Code for a value; [`UNSEEN_CODE`] when not in the vocabulary.
    pub fn code(&self, value: &str) -> i64 {
        self.codes.get(value).copied().unwrap_or(UNSEEN_CODE)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Encoders for all categorical feature columns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncodingTable {
    /// Table layout version, bumped when the column set changes
    pub version: u32,
    pub top_reason: CategoryEncoder,
    pub top_source: CategoryEncoder,
    pub device: CategoryEncoder,
    pub age: CategoryEncoder,
    pub locale: CategoryEncoder,
}

impl EncodingTable {
    /// Current table layout version
    pub const VERSION: u32 = 1;

    /// Fit all encoders from a batch of feature records.
    pub fn fit(records: &[FeatureRecord]) -> Self {
        Self {
            version: Self::VERSION,
            top_reason: CategoryEncoder::fit(records.iter().map(|r| r.top_reason.as_str())),
            top_source: CategoryEncoder::fit(records.iter().map(|r| r.top_source.as_str())),
            device: CategoryEncoder::fit(records.iter().map(|r| r.device.as_str())),
            age: CategoryEncoder::fit(records.iter().map(|r| r.age.as_str())),
            locale: CategoryEncoder::fit(records.iter().map(|r| r.locale.as_str())),
        }
    }

    /// Load a persisted table from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the table to JSON for persistence
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
