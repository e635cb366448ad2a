//! Fixed static assets: the map page and its icon
//!
//! Only the paths in [`STATIC_ROUTES`] are served, read from the configured
//! static directory on each request.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::io::ErrorKind;
use tracing::warn;

use crate::routes::{error_response, internal_error_response};
use crate::server::AppState;

/// A servable asset: file name inside the static directory and its content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAsset {
    pub file: &'static str,
    pub content_type: &'static str,
}

const MAP_PAGE: StaticAsset = StaticAsset {
    file: "index.html",
    content_type: "text/html; charset=utf-8",
};

const ICON: StaticAsset = StaticAsset {
    file: "icon.svg",
    content_type: "image/svg+xml",
};

/// Request path → asset
pub const STATIC_ROUTES: &[(&str, StaticAsset)] = &[
    ("/", MAP_PAGE),
    ("/index.html", MAP_PAGE),
    ("/icon.svg", ICON),
    ("/favicon.svg", ICON),
];

/// Look up the asset served at a request path
pub fn static_asset(path: &str) -> Option<StaticAsset> {
    STATIC_ROUTES
        .iter()
        .find(|(route, _)| *route == path)
        .map(|(_, asset)| *asset)
}

/// GET a fixed static asset
pub async fn handle_static(state: &AppState, asset: StaticAsset) -> Response<Full<Bytes>> {
    let path = state.args.static_dir.join(asset.file);

    match tokio::fs::read(&path).await {
        Ok(contents) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", asset.content_type)
            .header("Cache-Control", "public, max-age=300")
            .body(Full::new(Bytes::from(contents)))
            .unwrap(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "Static asset missing");
            error_response(
                StatusCode::NOT_FOUND,
                "Not Found",
                format!("{} is not available", asset.file),
                None,
            )
        }
        Err(e) => {
            warn!(path = %path.display(), "Failed to read static asset: {}", e);
            internal_error_response(&e.to_string(), state.args.dev_mode())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_and_index_serve_map_page() {
        assert_eq!(static_asset("/"), Some(MAP_PAGE));
        assert_eq!(static_asset("/index.html"), Some(MAP_PAGE));
        assert_eq!(static_asset("/icon.svg"), Some(ICON));
    }

    #[test]
    fn test_other_paths_are_not_static() {
        assert_eq!(static_asset("/api/features"), None);
        assert_eq!(static_asset("/../Cargo.toml"), None);
        assert_eq!(static_asset("/index.htm"), None);
    }
}
