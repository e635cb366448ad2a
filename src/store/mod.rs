//! Feature storage seam
//!
//! The HTTP layer only talks to [`FeatureStore`]. Production uses the
//! MongoDB-backed [`MongoFeatureStore`]; [`MemoryFeatureStore`] keeps
//! everything in process and can inject failures for tests.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::db::FeatureDoc;
use crate::types::Result;

pub use memory::MemoryFeatureStore;
pub use mongo::MongoFeatureStore;

/// Read access to the feature collection
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Last known reachability; cheap, may lag by one probe interval
    fn is_connected(&self) -> bool;

    /// Check reachability now, updating what `is_connected` reports
    async fn refresh_connectivity(&self) -> bool {
        self.is_connected()
    }

    /// Fast count from collection metadata; may be approximate
    async fn estimated_count(&self) -> Result<u64>;

    /// Exact count of every document
    async fn exact_count(&self) -> Result<u64>;

    /// Documents ordered ascending by `_id`, after skipping `skip`, at most `limit`
    async fn find_page(&self, skip: u64, limit: i64) -> Result<Vec<FeatureDoc>>;

    /// Cursor over every document ordered ascending by `_id`
    async fn stream_all(&self) -> Result<BoxStream<'static, Result<FeatureDoc>>>;
}
