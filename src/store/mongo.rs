//! MongoDB-backed feature store

use async_trait::async_trait;
use bson::doc;
use futures::stream::BoxStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{FeatureDoc, MongoClient, MongoCollection};
use crate::store::FeatureStore;
use crate::types::Result;

/// Feature store reading from one MongoDB collection
#[derive(Clone)]
pub struct MongoFeatureStore {
    client: MongoClient,
    features: MongoCollection<FeatureDoc>,
    indexes_ready: Arc<AtomicBool>,
}

impl MongoFeatureStore {
    /// Wrap a collection without contacting the server
    pub fn new(client: MongoClient, collection_name: &str) -> Self {
        let features = client.collection_unchecked::<FeatureDoc>(collection_name);
        Self {
            client,
            features,
            indexes_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create the schema indexes once. Failures are logged, not fatal, and
    /// the next call tries again.
    pub async fn ensure_indexes(&self) -> bool {
        if self.indexes_ready.load(Ordering::Relaxed) {
            return true;
        }

        match self.features.apply_indexes().await {
            Ok(()) => {
                self.indexes_ready.store(true, Ordering::Relaxed);
                info!(
                    collection = %self.features.inner().name(),
                    "Feature indexes ensured"
                );
                true
            }
            Err(e) => {
                warn!("Could not create feature indexes: {}", e);
                false
            }
        }
    }

    /// Insert parsed features, stamping timestamps
    pub async fn insert_many(&self, features: Vec<FeatureDoc>) -> Result<usize> {
        self.features.insert_many(features).await
    }
}

#[async_trait]
impl FeatureStore for MongoFeatureStore {
    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    async fn refresh_connectivity(&self) -> bool {
        self.client.ping().await.is_ok()
    }

    async fn estimated_count(&self) -> Result<u64> {
        self.features.estimated_count().await
    }

    async fn exact_count(&self) -> Result<u64> {
        self.features.count(doc! {}).await
    }

    async fn find_page(&self, skip: u64, limit: i64) -> Result<Vec<FeatureDoc>> {
        self.features
            .find_page(doc! {}, doc! { "_id": 1 }, skip, limit)
            .await
    }

    async fn stream_all(&self) -> Result<BoxStream<'static, Result<FeatureDoc>>> {
        self.features.stream(doc! {}, doc! { "_id": 1 }).await
    }
}
