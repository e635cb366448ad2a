//! Featuremap - GeoJSON feature API for an embedded map page
//!
//! Serves map features stored in MongoDB to a browser client that loads
//! them progressively.
//!
//! ## Endpoints
//!
//! - **Count**: total feature count, cached for a short window
//! - **Batch**: paginated features sorted by insertion id, with retries
//! - **Legacy**: the whole collection as one FeatureCollection
//! - **Health**: liveness plus database connectivity
//! - **Static**: the map page and its icon

pub mod cache;
pub mod config;
pub mod db;
pub mod geojson;
pub mod import;
pub mod logging;
pub mod retry;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{MapError, Result};
