//! Remote notifier for afr.
//!
//! Posts a [`Message`] to the namespace root of a broadcaster running in
//! another process. Requests are blocking (ureq); call from a blocking
//! context or `spawn_blocking` inside async code.
//!
//! ```ignore
//! use afr_core::Message;
//! use afr_notify::{NotifyOptions, maybe_send};
//!
//! // Fine to call before the server is up
//! maybe_send(&Message::reload(), &NotifyOptions::default())?;
//! ```

mod error;

use std::time::Duration;

use afr_core::Message;
use ureq::Agent;

pub use error::NotifyError;

/// Where and how to send a message.
#[derive(Clone, Debug)]
pub struct NotifyOptions {
    /// Full target URL. Wins over `hostname`, `port` and `namespace`.
    pub url: Option<String>,
    /// Broadcaster host.
    pub hostname: String,
    /// Broadcaster port.
    pub port: u16,
    /// Broadcaster namespace.
    pub namespace: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for NotifyOptions {
    fn default() -> Self {
        Self {
            url: None,
            hostname: "localhost".to_owned(),
            port: 8080,
            namespace: "/afr/".to_owned(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl NotifyOptions {
    /// URL the message is posted to.
    pub fn target_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }

        let namespace = self.namespace.trim_matches('/');
        if namespace.is_empty() {
            format!("http://{}:{}/", self.hostname, self.port)
        } else {
            format!("http://{}:{}/{namespace}/", self.hostname, self.port)
        }
    }
}

/// Create HTTP agent with the specified timeout.
fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Post `message` to a broadcaster.
///
/// # Errors
///
/// Returns [`NotifyError::Connection`] if nothing is listening at the
/// target, [`NotifyError::Status`] if the broadcaster rejects the message,
/// and [`NotifyError::Request`] for any other transport failure.
pub fn send(message: &Message, opts: &NotifyOptions) -> Result<(), NotifyError> {
    let json = message.to_json()?;
    let url = opts.target_url();

    let response = create_agent(opts.timeout)
        .post(&url)
        .header("Content-Type", "application/json")
        .send(json.as_bytes())
        .map_err(|source| {
            if error::is_unreachable(&source) {
                NotifyError::Connection {
                    url: url.clone(),
                    source,
                }
            } else {
                NotifyError::Request {
                    url: url.clone(),
                    source,
                }
            }
        })?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        let body = response
            .into_body()
            .read_to_string()
            .unwrap_or_else(|_| String::from("(unable to read error body)"));
        return Err(NotifyError::Status { status, body });
    }

    tracing::debug!(url = %url, kind = message.kind(), path = message.path(), "Sent message");
    Ok(())
}

/// Like [`send`], but a missing listener counts as success.
///
/// Lets a build step fire a reload right after boot, before the server it
/// targets may have started.
///
/// # Errors
///
/// Returns every error [`send`] does except [`NotifyError::Connection`].
pub fn maybe_send(message: &Message, opts: &NotifyOptions) -> Result<(), NotifyError> {
    match send(message, opts) {
        Err(e) if e.is_connection() => {
            tracing::debug!(error = %e, "No broadcaster listening, message dropped");
            Ok(())
        }
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afr_server::{BroadcastOptions, Broadcaster, ServerConfig, serve};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::net::TcpListener as StdTcpListener;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// A port with nothing listening on it.
    fn closed_port() -> u16 {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn options(port: u16) -> NotifyOptions {
        NotifyOptions {
            hostname: "127.0.0.1".to_owned(),
            port,
            ..NotifyOptions::default()
        }
    }

    #[test]
    fn test_default_target_url() {
        assert_eq!(
            NotifyOptions::default().target_url(),
            "http://localhost:8080/afr/"
        );
    }

    #[test]
    fn test_target_url_normalizes_namespace() {
        let opts = NotifyOptions {
            namespace: "dev".to_owned(),
            port: 3000,
            ..NotifyOptions::default()
        };
        assert_eq!(opts.target_url(), "http://localhost:3000/dev/");

        let opts = NotifyOptions {
            namespace: "/".to_owned(),
            ..NotifyOptions::default()
        };
        assert_eq!(opts.target_url(), "http://localhost:8080/");
    }

    #[test]
    fn test_url_overrides_host_and_port() {
        let opts = NotifyOptions {
            url: Some("http://example.test:9/x/".to_owned()),
            port: 1234,
            ..NotifyOptions::default()
        };
        assert_eq!(opts.target_url(), "http://example.test:9/x/");
    }

    #[test]
    fn test_send_without_listener_is_connection_error() {
        let result = send(&Message::reload(), &options(closed_port()));

        assert!(
            matches!(result, Err(NotifyError::Connection { .. })),
            "{result:?}"
        );
    }

    #[test]
    fn test_maybe_send_without_listener_succeeds() {
        let result = maybe_send(&Message::reload(), &options(closed_port()));

        assert!(result.is_ok(), "{result:?}");
    }

    async fn start_server(
        broadcaster: Broadcaster,
    ) -> (u16, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            serve(listener, &ServerConfig::default(), broadcaster, async {
                let _ = stop_rx.await;
            })
            .await
            .unwrap();
        });
        (port, stop_tx, handle)
    }

    #[tokio::test]
    async fn test_send_reaches_connected_client() {
        let broadcaster = Broadcaster::default();
        let mut client = broadcaster.register();
        let (port, stop, server) = start_server(broadcaster.clone()).await;

        let opts = options(port);
        tokio::task::spawn_blocking(move || send(&Message::change("css/site.css"), &opts))
            .await
            .unwrap()
            .unwrap();

        let payload = client.next().await.unwrap();
        assert_eq!(&*payload, r#"{"type":"change","path":"css/site.css"}"#);

        drop(client);
        stop.send(()).unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_maybe_send_propagates_status_error() {
        let broadcaster = Broadcaster::new(BroadcastOptions {
            namespace: "/other/".to_owned(),
            ..BroadcastOptions::default()
        });
        let (port, stop, server) = start_server(broadcaster).await;

        let opts = options(port);
        let result = tokio::task::spawn_blocking(move || maybe_send(&Message::reload(), &opts))
            .await
            .unwrap();

        assert!(
            matches!(result, Err(NotifyError::Status { status: 404, .. })),
            "{result:?}"
        );

        stop.send(()).unwrap();
        server.await.unwrap();
    }
}
