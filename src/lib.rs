//! GeoPlaces - batch engine for deriving a user's significant places
//!
//! GeoPlaces turns raw, timestamped geolocation pings into labeled places
//! (home, work, ...) through a deterministic per-user pipeline:
//! preprocessing → spatial clustering → feature extraction → normalization
//! → classification.
//!
//! ## Pipeline stages
//!
//! - **Preprocessing**: local-time correction, 3-day trailing window,
//!   dense sequence indexing, minimum-density filtering
//! - **Clustering**: per-user density-based clustering of pings (pluggable
//!   via [`SpatialClusterer`]; a haversine DBSCAN is built in)
//! - **Features**: per-cluster temporal, geometric, and categorical features
//! - **Prediction**: z-score normalization and an external classifier,
//!   reshaped into a per-user place mapping

pub mod cluster;
pub mod encoding;
pub mod error;
pub mod features;
pub mod geometry;
pub mod normalizer;
pub mod pipeline;
pub mod predict;
pub mod preprocess;
pub mod runs;
pub mod temporal;
pub mod types;

pub use cluster::{GeoDbscan, SpatialClusterer, NOISE_CLUSTER};
pub use encoding::EncodingTable;
pub use error::PlacesError;
pub use normalizer::NormStats;
pub use pipeline::{find_places, PlaceFinder, PlacesConfig};
pub use predict::{PlaceClassifier, MIN_PLACE_RADIUS_METERS};
pub use types::{
    ClusteredEvent, GeoEvent, PlaceSummary, PlacesByUser, RawGeoRecord, UserPlaces, UserProfile,
};

/// Engine version embedded in persisted encoding/normalization tables
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
