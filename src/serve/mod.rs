//! Read-only lookup service over the built catalog
//!
//! Each request is stateless against the immutable, pre-built catalog
//! shared behind an `Arc`; nothing is locked because nothing is mutated
//! after build. Routes:
//!
//! - `GET /parts/{partNumber}` — redirect to the canonical readme path
//! - `GET /parts/{partNumber}/README.md` — rendered detail page
//! - `GET /parts/{partNumber}/{filename}` — proxied fetch of the file's
//!   derived URL
//! - anything else — static asset lookup under the public directory
//!
//! Part numbers are matched case-insensitively against the uppercased
//! index keys. Proxied fetches are at-most-once; an upstream failure
//! propagates instead of being retried.

use axum::{
    body::Body,
    extract::{Path as UrlPath, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::core::catalog::Catalog;

pub mod page;

pub use page::{PageError, Pages};

/// Canonical readme filename inside a part's namespace.
const README: &str = "README.md";

/// Shared, immutable request state.
pub struct AppState {
    pub catalog: Catalog,
    pub pages: Pages,
    pub client: reqwest::Client,
}

/// Build the lookup router with a static-asset fallback.
pub fn router(state: Arc<AppState>, public_dir: &Path) -> Router {
    Router::new()
        .route("/parts/:part_number", get(part_index))
        .route("/parts/:part_number/:filename", get(part_file))
        .fallback_service(ServeDir::new(public_dir))
        .with_state(state)
}

/// Bind and run the server until shutdown.
pub async fn serve(addr: &str, router: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "serving catalog");
    axum::serve(listener, router).await
}

/// `GET /parts/{partNumber}` — no filename segment: send the client to
/// the canonical, case-normalized readme path.
async fn part_index(
    UrlPath(part_number): UrlPath<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let key = part_number.to_uppercase();
    if state.catalog.part(&key).is_none() {
        return not_found(format!("couldn't find part {}", key));
    }
    Redirect::temporary(&format!("/parts/{}/{}", key, README)).into_response()
}

/// `GET /parts/{partNumber}/{filename}` — detail page or proxied file.
async fn part_file(
    UrlPath((part_number, filename)): UrlPath<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let key = part_number.to_uppercase();
    let Some(part) = state.catalog.part(&key) else {
        return not_found(format!("couldn't find part {}", key));
    };

    if filename == README {
        return match state.pages.render_part(&state.catalog, part) {
            Ok(html) => Html(html).into_response(),
            Err(err) => {
                warn!(part = %key, error = %err, "part page rendering failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to render part page",
                )
                    .into_response()
            }
        };
    }

    let Some(file) = part
        .descriptor
        .files
        .iter()
        .find(|file| file.filename.as_deref() == Some(filename.as_str()))
    else {
        return not_found(format!("couldn't find file {} in part {}", filename, key));
    };

    let Some(url) = file.url.as_deref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("file {} in part {} has no retrieval URL", filename, key),
        )
            .into_response();
    };

    proxy(&state.client, url).await
}

/// Fetch the derived URL and stream it through, passing the upstream
/// status along. At-most-once: transport failures become 502, never a
/// retry.
async fn proxy(client: &reqwest::Client, url: &str) -> Response {
    match client.get(url).send().await {
        Ok(upstream) => {
            let status = StatusCode::from_u16(upstream.status().as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            let content_type = upstream
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);

            let mut builder = Response::builder().status(status);
            if let Some(content_type) = content_type {
                builder = builder.header(header::CONTENT_TYPE, content_type);
            }
            builder
                .body(Body::from_stream(upstream.bytes_stream()))
                .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
        }
        Err(err) => {
            warn!(url = %url, error = %err, "proxied fetch failed");
            (StatusCode::BAD_GATEWAY, "upstream fetch failed").into_response()
        }
    }
}

fn not_found(message: String) -> Response {
    (StatusCode::NOT_FOUND, message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{RawPart, RawProject, Snapshot};
    use crate::core::identity::{PartNumber, ProjectId};
    use crate::core::resolver;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router(tmp: &tempfile::TempDir) -> Router {
        let part = RawPart {
            part_number: PartNumber::parse("LUTRIS.a.b").unwrap(),
            readme: None,
            descriptor: serde_yml::from_str(
                "name: Widget\nfiles:\n  - filename: widget.stl\n    ipfs: QmWidget\n  - filename: unpinned.txt\n",
            )
            .unwrap(),
        };
        let snapshot = Snapshot {
            projects: vec![RawProject {
                id: ProjectId::root("a"),
                projects: vec![],
                parts: vec![part],
                readme: None,
            }],
            vendors: vec![],
            licenses: Default::default(),
        };
        let state = Arc::new(AppState {
            catalog: resolver::resolve(snapshot).unwrap(),
            pages: Pages::new().unwrap(),
            client: reqwest::Client::new(),
        });
        router(state, tmp.path())
    }

    async fn get_response(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_filename_redirects_to_canonical_readme() {
        let tmp = tempfile::tempdir().unwrap();
        let response = get_response(test_router(&tmp), "/parts/lutris.a.b").await;
        assert!(response.status().is_redirection());
        assert_eq!(
            response.headers()[header::LOCATION],
            "/parts/LUTRIS.A.B/README.md"
        );
    }

    #[tokio::test]
    async fn test_unknown_part_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let response = get_response(test_router(&tmp), "/parts/lutris.a.nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_readme_renders_detail_page() {
        let tmp = tempfile::tempdir().unwrap();
        let response = get_response(test_router(&tmp), "/parts/LUTRIS.A.B/README.md").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("LUTRIS.A.B"));
        assert!(html.contains("widget.stl"));
    }

    #[tokio::test]
    async fn test_unknown_filename_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let response = get_response(test_router(&tmp), "/parts/LUTRIS.A.B/missing.stl").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_file_without_url_is_500() {
        let tmp = tempfile::tempdir().unwrap();
        let response = get_response(test_router(&tmp), "/parts/LUTRIS.A.B/unpinned.txt").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_other_paths_fall_through_to_static_assets() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("hello.txt"), "hi").unwrap();
        let response = get_response(test_router(&tmp), "/hello.txt").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
