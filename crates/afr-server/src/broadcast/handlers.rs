//! HTTP handlers for the broadcaster routes.

use std::convert::Infallible;

use afr_core::Message;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt};

use super::{Broadcaster, CLIENT_SCRIPT};

/// Handle GET {namespace}: open an event stream.
pub(crate) async fn connect(
    State(broadcaster): State<Broadcaster>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = broadcaster
        .register()
        .map(|json| Ok(Event::default().data(&*json)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handle POST {namespace}: broadcast the JSON body.
pub(crate) async fn notify(State(broadcaster): State<Broadcaster>, body: Bytes) -> Response {
    let message: Message = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected malformed notification");
            return (StatusCode::BAD_REQUEST, format!("invalid message: {e}")).into_response();
        }
    };

    broadcaster.broadcast(&message);
    StatusCode::NO_CONTENT.into_response()
}

/// Handle GET {namespace}{client_path}: serve the browser script.
pub(crate) async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        CLIENT_SCRIPT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn app(broadcaster: &Broadcaster) -> Router {
        broadcaster.router()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_post_broadcasts_body() {
        let broadcaster = Broadcaster::default();
        let mut connection = broadcaster.register();

        let response = app(&broadcaster)
            .oneshot(post("/afr/", r#"{"type":"change","path":"a.css"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            connection.next().await.as_deref(),
            Some(r#"{"type":"change","path":"a.css"}"#)
        );
    }

    #[tokio::test]
    async fn test_post_without_connections_succeeds() {
        let broadcaster = Broadcaster::default();

        let response = app(&broadcaster)
            .oneshot(post("/afr/", r#"{"type":"reload"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_post_malformed_json_is_client_error() {
        let broadcaster = Broadcaster::default();
        let _connection = broadcaster.register();

        let response = app(&broadcaster)
            .oneshot(post("/afr/", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.starts_with("invalid message"));
        assert_eq!(broadcaster.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_post_without_type_is_client_error() {
        let broadcaster = Broadcaster::default();

        let response = app(&broadcaster)
            .oneshot(post("/afr/", r#"{"path":"a.css"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_client_script_served() {
        let broadcaster = Broadcaster::default();

        let response = app(&broadcaster)
            .oneshot(Request::get("/afr/client.mjs").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/javascript; charset=utf-8"
        );
        assert_eq!(body_string(response).await, CLIENT_SCRIPT);
        assert_eq!(broadcaster.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_get_opens_event_stream() {
        let broadcaster = Broadcaster::default();

        let response = app(&broadcaster)
            .oneshot(Request::get("/afr/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(broadcaster.connection_count(), 1);

        drop(response);
        assert_eq!(broadcaster.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_routes_outside_namespace_not_handled() {
        let broadcaster = Broadcaster::default();

        let response = app(&broadcaster)
            .oneshot(Request::get("/other/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_custom_namespace_and_client_path() {
        let broadcaster = Broadcaster::new(crate::broadcast::BroadcastOptions {
            namespace: "/dev".to_owned(),
            client_path: "live.js".to_owned(),
        });

        let response = app(&broadcaster)
            .oneshot(Request::get("/dev/live.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(&broadcaster)
            .oneshot(Request::get("/afr/client.mjs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
