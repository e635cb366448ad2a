//! Database layer for featuremap
//!
//! MongoDB access for the feature collection.

pub mod mongo;
pub mod schemas;

pub use mongo::{spawn_ping_task, MongoClient, MongoCollection};
pub use schemas::{FeatureDoc, FEATURE_COLLECTION};
