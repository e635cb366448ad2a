//! In-process feature store
//!
//! Holds documents in a vector sorted by `_id`. The connectivity flag and
//! injected failures let callers exercise the 503 and retry paths without
//! a MongoDB server.

use async_trait::async_trait;
use bson::oid::ObjectId;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;

use crate::db::FeatureDoc;
use crate::store::FeatureStore;
use crate::types::{MapError, Result};

/// Memory-only feature store
#[derive(Debug)]
pub struct MemoryFeatureStore {
    features: RwLock<Vec<FeatureDoc>>,
    connected: AtomicBool,
    /// Number of upcoming queries that fail with a transient error
    pending_failures: AtomicU32,
    /// When set, `estimated_count` always fails
    estimate_broken: AtomicBool,
    /// When set, every query fails as if a stored document were malformed
    malformed: AtomicBool,
    /// Total query calls, successful or not
    calls: AtomicU32,
}

impl Default for MemoryFeatureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFeatureStore {
    /// Create an empty, connected store
    pub fn new() -> Self {
        Self {
            features: RwLock::new(Vec::new()),
            connected: AtomicBool::new(true),
            pending_failures: AtomicU32::new(0),
            estimate_broken: AtomicBool::new(false),
            malformed: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        }
    }

    /// Create a connected store holding the given documents
    pub fn with_features(features: Vec<FeatureDoc>) -> Self {
        let store = Self::new();
        store.insert_many(features);
        store
    }

    /// Insert documents, assigning ids to any that lack one
    pub fn insert_many(&self, features: Vec<FeatureDoc>) {
        let mut guard = self.features.write().unwrap_or_else(|e| e.into_inner());
        for mut feature in features {
            feature.id.get_or_insert_with(ObjectId::new);
            guard.push(feature);
        }
        guard.sort_by_key(|f| f.id);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Make the next `count` queries fail with a transient database error
    pub fn fail_next(&self, count: u32) {
        self.pending_failures.store(count, Ordering::Relaxed);
    }

    /// Make `estimated_count` fail so callers fall back to the exact count
    pub fn break_estimate(&self, broken: bool) {
        self.estimate_broken.store(broken, Ordering::Relaxed);
    }

    /// Make every query fail with a document decode error
    pub fn set_malformed(&self, malformed: bool) {
        self.malformed.store(malformed, Ordering::Relaxed);
    }

    /// Number of query calls made so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<FeatureDoc> {
        self.features
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Count the call and consume one injected failure if any remain
    fn begin_query(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if !self.connected.load(Ordering::Relaxed) {
            return Err(MapError::Database("connection closed".into()));
        }

        if self.malformed.load(Ordering::Relaxed) {
            return Err(MapError::Decode("invalid type: null, expected a string".into()));
        }

        let consumed = self
            .pending_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(MapError::Database("operation timed out".into()));
        }

        Ok(())
    }
}

#[async_trait]
impl FeatureStore for MemoryFeatureStore {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn estimated_count(&self) -> Result<u64> {
        self.begin_query()?;
        if self.estimate_broken.load(Ordering::Relaxed) {
            return Err(MapError::Database("estimated count unsupported".into()));
        }
        Ok(self.len() as u64)
    }

    async fn exact_count(&self) -> Result<u64> {
        self.begin_query()?;
        Ok(self.len() as u64)
    }

    async fn find_page(&self, skip: u64, limit: i64) -> Result<Vec<FeatureDoc>> {
        self.begin_query()?;
        if i64::try_from(skip).is_err() {
            return Err(MapError::Database(format!("skip {} out of range", skip)));
        }
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(self.snapshot().into_iter().skip(skip).take(take).collect())
    }

    async fn stream_all(&self) -> Result<BoxStream<'static, Result<FeatureDoc>>> {
        self.begin_query()?;
        Ok(stream::iter(self.snapshot().into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn docs(n: usize) -> Vec<FeatureDoc> {
        (0..n)
            .map(|i| FeatureDoc {
                file: format!("file-{}", i),
                ..Default::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_pages_follow_id_order() {
        let store = MemoryFeatureStore::with_features(docs(5));

        let first = store.find_page(0, 2).await.unwrap();
        let second = store.find_page(2, 2).await.unwrap();
        let last = store.find_page(4, 2).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(last.len(), 1);
        assert!(first[1].id < second[0].id);
        assert!(second[1].id < last[0].id);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = MemoryFeatureStore::with_features(docs(3));
        store.fail_next(2);

        assert!(store.exact_count().await.is_err());
        assert!(store.exact_count().await.is_err());
        assert_eq!(store.exact_count().await.unwrap(), 3);
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test]
    async fn test_broken_estimate_leaves_exact_count_working() {
        let store = MemoryFeatureStore::with_features(docs(4));
        store.break_estimate(true);

        assert!(store.estimated_count().await.is_err());
        assert_eq!(store.exact_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_stream_all_yields_everything() {
        let store = MemoryFeatureStore::with_features(docs(3));
        let all: Vec<FeatureDoc> = store.stream_all().await.unwrap().try_collect().await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_disconnected_store_fails_queries() {
        let store = MemoryFeatureStore::new();
        store.set_connected(false);
        assert!(!store.is_connected());
        assert!(store.find_page(0, 10).await.is_err());
    }
}
