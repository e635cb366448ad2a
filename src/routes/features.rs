//! Feature API endpoints
//!
//! ## Endpoints
//!
//! - `GET /api/features/count` - Total feature count, cached for the configured TTL
//! - `GET /api/features/batch?page=&limit=` - One page of features ordered by `_id`
//! - `GET /api/features` - Every feature in one collection (legacy, unbounded)
//!
//! Count and batch answer 503 straight away when the store is disconnected and
//! retry transient query failures before answering 500.

use bytes::Bytes;
use futures::TryStreamExt;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::db::FeatureDoc;
use crate::geojson::{FeatureCollection, GeoJsonFeature};
use crate::routes::{database_unavailable_response, error_response, json_response};
use crate::server::AppState;
use crate::store::FeatureStore;
use crate::types::Result;

pub const DEFAULT_PAGE: u64 = 0;
pub const DEFAULT_LIMIT: u64 = 500;

/// The server rejects skips that do not fit a signed 64-bit integer
const MAX_SKIP: u64 = i64::MAX as u64;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query parameters for a batch request
///
/// Anything missing or unparseable falls back to the default; a limit of
/// zero is treated as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchQuery {
    pub page: u64,
    pub limit: u64,
}

impl Default for BatchQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl BatchQuery {
    pub fn from_query_string(query: Option<&str>) -> Self {
        let mut params = Self::default();

        if let Some(q) = query {
            for pair in q.split('&') {
                if let Some((key, value)) = pair.split_once('=') {
                    let value = urlencoding::decode(value).unwrap_or_default();
                    let value = value.trim();
                    match key {
                        "page" => params.page = value.parse().unwrap_or(DEFAULT_PAGE),
                        "limit" => {
                            params.limit = value
                                .parse()
                                .ok()
                                .filter(|limit| *limit > 0)
                                .unwrap_or(DEFAULT_LIMIT)
                        }
                        _ => {}
                    }
                }
            }
        }

        params
    }

    /// Documents to skip before this page, clamped to the largest skip
    /// MongoDB accepts
    pub fn skip(&self) -> u64 {
        self.page.saturating_mul(self.limit).min(MAX_SKIP)
    }
}

/// Count response
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
    /// True when served from the count cache
    pub cached: bool,
}

/// One page of features
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub features: Vec<GeoJsonFeature>,
    pub page: u64,
    pub limit: u64,
    /// True when the page came back full. A full final page still reports
    /// true, so clients may fetch one trailing empty page.
    pub has_more: bool,
    /// Number of features in this page
    pub count: usize,
}

// =============================================================================
// Store Operations
// =============================================================================

/// Count features, preferring the estimate and falling back to an exact count
async fn count_features(store: &dyn FeatureStore) -> Result<u64> {
    match store.estimated_count().await {
        Ok(count) => Ok(count),
        Err(e) => {
            debug!("Estimated count failed ({}), falling back to exact count", e);
            store.exact_count().await
        }
    }
}

async fn fetch_page(store: &dyn FeatureStore, query: BatchQuery) -> Result<Vec<GeoJsonFeature>> {
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
    let docs = store.find_page(query.skip(), limit).await?;
    Ok(docs.into_iter().map(FeatureDoc::into_geojson).collect())
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// GET /api/features/count
pub async fn handle_count(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let store = state.store.as_ref();

    if !store.is_connected() {
        return database_unavailable_response();
    }

    if let Some(count) = state.count_cache.get() {
        return json_response(
            StatusCode::OK,
            &CountResponse {
                count,
                cached: true,
            },
        );
    }

    match state
        .count_retry
        .execute("feature_count", || count_features(store))
        .await
    {
        Ok(count) => {
            state.count_cache.store(count);
            json_response(
                StatusCode::OK,
                &CountResponse {
                    count,
                    cached: false,
                },
            )
        }
        Err(e) => {
            error!(attempts = e.attempts, "Feature count failed: {}", e.last_error);
            error_response(
                e.last_error.status_code(),
                "Failed to fetch feature count",
                e.last_error.to_string(),
                Some(e.attempts),
            )
        }
    }
}

/// GET /api/features/batch?page=&limit=
pub async fn handle_batch(state: Arc<AppState>, query: Option<&str>) -> Response<Full<Bytes>> {
    let params = BatchQuery::from_query_string(query);
    let store = state.store.as_ref();

    if !store.is_connected() {
        return database_unavailable_response();
    }

    match state
        .batch_retry
        .execute("feature_batch", || fetch_page(store, params))
        .await
    {
        Ok(features) => {
            let count = features.len();
            let has_more = count as u64 == params.limit;
            debug!(
                page = params.page,
                limit = params.limit,
                count,
                has_more,
                "Served feature batch"
            );
            json_response(
                StatusCode::OK,
                &BatchResponse {
                    features,
                    page: params.page,
                    limit: params.limit,
                    has_more,
                    count,
                },
            )
        }
        Err(e) => {
            error!(
                attempts = e.attempts,
                page = params.page,
                limit = params.limit,
                "Feature batch failed: {}",
                e.last_error
            );
            error_response(
                e.last_error.status_code(),
                "Failed to fetch features batch",
                e.last_error.to_string(),
                Some(e.attempts),
            )
        }
    }
}

/// GET /api/features
///
/// Kept for clients predating batching. Memory grows with the collection.
pub async fn handle_all(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let result: Result<Vec<GeoJsonFeature>> = async {
        state
            .store
            .stream_all()
            .await?
            .map_ok(FeatureDoc::into_geojson)
            .try_collect()
            .await
    }
    .await;

    match result {
        Ok(features) => {
            info!(count = features.len(), "Served full feature collection");
            json_response(StatusCode::OK, &FeatureCollection::new(features))
        }
        Err(e) => {
            error!("Full feature collection failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch features",
                e.to_string(),
                None,
            )
        }
    }
}
