//! Router construction.
//!
//! Combines the broadcaster routes with optional file serving.

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::broadcast::Broadcaster;
use crate::files::FileServer;
use crate::middleware::security;

/// Create the application router.
///
/// Namespace routes go to the broadcaster. Everything else goes to `files`
/// when present and answers 404 otherwise.
pub fn create_router(broadcaster: &Broadcaster, files: Option<&FileServer>) -> Router {
    let mut router: Router = broadcaster.router();

    if let Some(files) = files {
        router = router.fallback_service(files.router::<()>());
    }

    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(security::content_type_options_layer()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use afr_core::Dir;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tower::ServiceExt;

    async fn status(router: Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_unmatched_route_is_not_found() {
        let broadcaster = Broadcaster::default();
        let router = create_router(&broadcaster, None);

        assert_eq!(status(router, "/index.html").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_namespace_and_files_share_router() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("index.html"), "home").unwrap();
        let broadcaster = Broadcaster::default();
        let files = FileServer::new(vec![Dir::new(temp_dir.path())]);

        let router = create_router(&broadcaster, Some(&files));

        assert_eq!(
            status(router.clone(), "/afr/client.mjs").await,
            StatusCode::OK
        );
        assert_eq!(status(router.clone(), "/index.html").await, StatusCode::OK);
        assert_eq!(status(router, "/nope.html").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_responses_carry_nosniff() {
        let broadcaster = Broadcaster::default();
        let response = create_router(&broadcaster, None)
            .oneshot(Request::get("/afr/client.mjs").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }
}
