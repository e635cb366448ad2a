//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one task per accepted connection.

use bytes::Bytes;
use futures::FutureExt;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::cache::CountCache;
use crate::config::Args;
use crate::retry::RetryPolicy;
use crate::routes;
use crate::store::FeatureStore;
use crate::types::MapError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Feature storage (MongoDB in production)
    pub store: Arc<dyn FeatureStore>,
    /// Process-wide cached feature count
    pub count_cache: CountCache,
    /// Retry policy for count queries
    pub count_retry: RetryPolicy,
    /// Retry policy for batch queries
    pub batch_retry: RetryPolicy,
}

impl AppState {
    /// Create state with the default retry policies and a system-clock cache
    pub fn new(args: Args, store: Arc<dyn FeatureStore>) -> Self {
        let count_cache = CountCache::new(args.count_cache_ttl());
        Self {
            args,
            store,
            count_cache,
            count_retry: RetryPolicy::count_default(),
            batch_retry: RetryPolicy::batch_default(),
        }
    }

    /// Replace the count cache (tests inject a manual clock here)
    pub fn with_count_cache(mut self, cache: CountCache) -> Self {
        self.count_cache = cache;
        self
    }

    /// Replace both retry policies
    pub fn with_retry_policies(mut self, count: RetryPolicy, batch: RetryPolicy) -> Self {
        self.count_retry = count;
        self.batch_retry = batch;
        self
    }
}

/// Start the HTTP server and run until Ctrl+C or SIGTERM
pub async fn run(state: Arc<AppState>) -> Result<(), MapError> {
    let listen = state.args.listen();
    let listener = TcpListener::bind(listen).await?;

    info!("Featuremap listening on {}", listen);

    if state.args.dev_mode() {
        warn!("Development mode enabled - internal error messages are exposed");
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(state, addr, req).await }
                        });

                        if let Err(err) = http1::Builder::new()
                            .serve_connection(io, service)
                            .await
                        {
                            debug!("Error serving connection from {}: {:?}", addr, err);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {:?}", e);
                }
            },
            _ = &mut shutdown => {
                info!("Server shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Log, route and guard a single request
async fn handle_request<B>(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let started = Instant::now();
    let dev_mode = state.args.dev_mode();

    let response = AssertUnwindSafe(dispatch(state, &method, &path, query.as_deref()))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_string());
            error!(%method, %path, "Request handler panicked: {}", message);
            routes::internal_error_response(&message, dev_mode)
        });

    info!(
        client = %addr,
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request handled"
    );

    Ok(response)
}

/// Route a request to its handler
pub async fn dispatch(
    state: Arc<AppState>,
    method: &Method,
    path: &str,
    query: Option<&str>,
) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/health") => routes::health_check(&state).await,

        (&Method::GET, "/api/features/count") => routes::handle_count(state).await,

        (&Method::GET, "/api/features/batch") => routes::handle_batch(state, query).await,

        // Legacy full collection
        (&Method::GET, "/api/features") => routes::handle_all(state).await,

        (&Method::GET, p) => match routes::static_asset(p) {
            Some(asset) => routes::handle_static(&state, asset).await,
            None => not_found_response(p),
        },

        _ => not_found_response(path),
    }
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
