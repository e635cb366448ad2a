//! Database schemas for featuremap

mod feature;

pub use feature::{FeatureDoc, DEFAULT_FILE, FEATURE_COLLECTION};
