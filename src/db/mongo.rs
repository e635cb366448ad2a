//! MongoDB client and collection wrapper

use bson::{doc, DateTime, Document};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use mongodb::{
    options::{ClientOptions, FindOptions, IndexOptions},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::types::{MapError, Result};

/// Database used when neither MONGO_DB nor the URI name one
pub const DEFAULT_DB_NAME: &str = "featuremap";

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(3);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas carrying store-assigned timestamps
pub trait Timestamped {
    fn stamp(&mut self, now: DateTime);
}

/// MongoDB client wrapper with a live connectivity flag
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
    connected: Arc<AtomicBool>,
}

impl MongoClient {
    /// Build a client from a connection string
    ///
    /// The driver connects lazily, so this only fails on a malformed URI.
    /// Call [`MongoClient::ping`] to find out whether the server is reachable.
    pub async fn new(uri: &str, db_name: Option<&str>) -> Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| MapError::Config(format!("Invalid MONGO_URI: {}", e)))?;

        // Fail fast on unreachable servers instead of the 30s driver default
        options
            .server_selection_timeout
            .get_or_insert(SERVER_SELECTION_TIMEOUT);
        options.connect_timeout.get_or_insert(CONNECT_TIMEOUT);
        options.app_name.get_or_insert_with(|| "featuremap".to_string());

        let db_name = db_name
            .map(str::to_string)
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DB_NAME.to_string());

        let client = Client::with_options(options)
            .map_err(|e| MapError::Config(format!("Failed to build MongoDB client: {}", e)))?;

        Ok(Self {
            client,
            db_name,
            connected: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Round-trip a ping and record the outcome in the connectivity flag
    pub async fn ping(&self) -> Result<()> {
        let result = self
            .client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| MapError::Database(format!("MongoDB ping failed: {}", e)));

        self.set_connected(result.is_ok());
        result
    }

    /// Whether the most recent ping succeeded
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn set_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::Relaxed);
        if was != connected {
            if connected {
                info!(db = %self.db_name, "MongoDB connected");
            } else {
                warn!(db = %self.db_name, "MongoDB disconnected");
            }
        }
    }

    /// Get a typed collection handle; indexes are applied separately
    pub fn collection_unchecked<T>(&self, name: &str) -> MongoCollection<T>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync,
    {
        MongoCollection {
            inner: self.client.database(&self.db_name).collection::<T>(name),
        }
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Spawn a background task that keeps the connectivity flag current
///
/// `on_connect` runs each time a ping succeeds after the previous one
/// failed, including when the server was unreachable at startup.
pub fn spawn_ping_task<C, CF>(client: MongoClient, interval: Duration, on_connect: C)
where
    C: FnMut() -> CF + Send + 'static,
    CF: Future<Output = ()> + Send + 'static,
{
    let connected = client.is_connected();
    let probe = move || {
        let client = client.clone();
        async move {
            match client.ping().await {
                Ok(()) => true,
                Err(e) => {
                    debug!("Connectivity probe failed: {}", e);
                    false
                }
            }
        }
    };

    tokio::spawn(monitor_connectivity(interval, connected, probe, on_connect));

    info!(
        interval_secs = interval.as_secs(),
        "MongoDB connectivity probe started"
    );
}

/// Probe forever, calling `on_connect` on every disconnected → connected edge
pub async fn monitor_connectivity<P, PF, C, CF>(
    interval: Duration,
    mut connected: bool,
    mut probe: P,
    mut on_connect: C,
) where
    P: FnMut() -> PF,
    PF: Future<Output = bool>,
    C: FnMut() -> CF,
    CF: Future<Output = ()>,
{
    loop {
        tokio::time::sleep(interval).await;

        let now = probe().await;
        if now && !connected {
            on_connect().await;
        }
        connected = now;
    }
}

/// Typed MongoDB collection
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + Timestamped,
{
    /// Apply schema-defined indexes
    pub async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| MapError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert documents, setting timestamps. Returns the number inserted.
    pub async fn insert_many(&self, mut items: Vec<T>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let now = DateTime::now();
        for item in items.iter_mut() {
            item.stamp(now);
        }

        let result = self
            .inner
            .insert_many(items)
            .await
            .map_err(|e| MapError::from_driver("Insert failed", e))?;

        Ok(result.inserted_ids.len())
    }
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + 'static,
{
    /// Metadata-based document count (fast, approximate)
    pub async fn estimated_count(&self) -> Result<u64> {
        self.inner
            .estimated_document_count()
            .await
            .map_err(|e| MapError::from_driver("Estimated count failed", e))
    }

    /// Exact document count (collection scan)
    pub async fn count(&self, filter: Document) -> Result<u64> {
        self.inner
            .count_documents(filter)
            .await
            .map_err(|e| MapError::from_driver("Count failed", e))
    }

    /// Fetch one page of documents matching a filter
    pub async fn find_page(
        &self,
        filter: Document,
        sort: Document,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<T>> {
        let options = FindOptions::builder()
            .sort(sort)
            .skip(skip)
            .limit(limit)
            .build();

        let cursor = self
            .inner
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| MapError::from_driver("Find failed", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| MapError::from_driver("Cursor read failed", e))
    }

    /// Open a cursor over every matching document
    pub async fn stream(
        &self,
        filter: Document,
        sort: Document,
    ) -> Result<BoxStream<'static, Result<T>>> {
        let cursor = self
            .inner
            .find(filter)
            .sort(sort)
            .await
            .map_err(|e| MapError::from_driver("Find failed", e))?;

        Ok(cursor
            .map_err(|e| MapError::from_driver("Cursor read failed", e))
            .boxed())
    }

    /// Get the underlying collection for advanced operations
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}
