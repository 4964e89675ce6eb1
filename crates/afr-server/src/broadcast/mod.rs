//! Connection registry and broadcaster.
//!
//! Browsers open a Server-Sent Events stream on the namespace root and
//! receive one `data:` frame per [`Message`]. Messages arrive either from an
//! in-process caller of [`Broadcaster::broadcast`] or from a `POST` to the
//! namespace root.
//!
//! The connection set lives inside the [`Broadcaster`] instance. Clones share
//! it; dropping the last clone (or calling [`Broadcaster::close`]) ends every
//! open stream.

mod connection;
mod handlers;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use afr_core::Message;
use axum::Router;
use axum::routing::get;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub use connection::ConnectionStream;

/// Default URL prefix for all broadcaster routes.
pub const DEFAULT_NAMESPACE: &str = "/afr/";

/// Default client script path, relative to the namespace.
pub const DEFAULT_CLIENT_PATH: &str = "client.mjs";

/// Messages buffered per connection. A client that falls this far behind
/// is dropped; `EventSource` reconnects on its own.
const CONNECTION_BUFFER: usize = 64;

/// Browser script that consumes the event stream.
pub(crate) const CLIENT_SCRIPT: &str = include_str!("client.mjs");

/// Broadcaster routing options.
#[derive(Clone, Debug)]
pub struct BroadcastOptions {
    /// URL prefix; normalized to start and end with `/`.
    pub namespace: String,
    /// Client script path under the namespace.
    pub client_path: String,
}

impl BroadcastOptions {
    /// Full URL path of the client script once routes are mounted.
    pub fn client_script_path(&self) -> String {
        format!(
            "{}{}",
            normalize_namespace(&self.namespace),
            self.client_path.trim_start_matches('/')
        )
    }
}

impl Default for BroadcastOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            client_path: DEFAULT_CLIENT_PATH.to_owned(),
        }
    }
}

type ConnectionId = u64;

/// Serialized message shared by every connection it is written to.
type Payload = Arc<str>;

pub(crate) struct Registry {
    connections: Mutex<HashMap<ConnectionId, mpsc::Sender<Payload>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, mpsc::Sender<Payload>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub(crate) fn remove(&self, id: ConnectionId, reason: &str) -> bool {
        let mut connections = self.lock();
        let removed = connections.remove(&id).is_some();
        if removed {
            tracing::info!(id, reason, connections = connections.len(), "Client disconnected");
        }
        removed
    }
}

/// Owns the set of open client connections and relays messages to them.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
    namespace: String,
    client_path: String,
}

impl Broadcaster {
    /// Create a broadcaster with the given routing options.
    pub fn new(options: BroadcastOptions) -> Self {
        let client_path = options.client_path.trim_start_matches('/').to_owned();
        Self {
            registry: Arc::new(Registry {
                connections: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
            namespace: normalize_namespace(&options.namespace),
            client_path,
        }
    }

    /// Normalized namespace (always starts and ends with `/`).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Full URL path of the client script.
    pub fn client_script_path(&self) -> String {
        format!("{}{}", self.namespace, self.client_path)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Register a new connection and return its message stream.
    ///
    /// The connection stays registered until a write to it fails or the
    /// returned stream is dropped.
    pub fn register(&self) -> ConnectionStream {
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);

        let count = {
            let mut connections = self.registry.lock();
            connections.insert(id, tx);
            connections.len()
        };
        tracing::info!(id, connections = count, "Client connected");

        ConnectionStream::new(id, rx, Arc::downgrade(&self.registry))
    }

    /// Send a message to every live connection.
    ///
    /// Never waits on a client: a connection whose buffer is full or whose
    /// receiver is gone counts as a failed write and is removed. The others
    /// are unaffected. Never reports failure.
    pub fn broadcast(&self, message: &Message) {
        let payload: Payload = match message.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize message");
                return;
            }
        };

        let (total, failed) = {
            let connections = self.registry.lock();
            let failed: Vec<_> = connections
                .iter()
                .filter_map(|(id, tx)| match tx.try_send(Arc::clone(&payload)) {
                    Ok(()) => None,
                    Err(TrySendError::Full(_)) => Some((*id, "buffer full")),
                    Err(TrySendError::Closed(_)) => Some((*id, "write failed")),
                })
                .collect();
            (connections.len(), failed)
        };

        for (id, reason) in &failed {
            self.registry.remove(*id, reason);
        }

        tracing::debug!(
            kind = message.kind(),
            path = message.path(),
            delivered = total - failed.len(),
            failed = failed.len(),
            "Broadcast message"
        );
    }

    /// Close every open connection.
    ///
    /// Streams end once their buffered messages are drained. New connections
    /// may still register afterwards.
    pub fn close(&self) {
        let mut connections = self.registry.lock();
        let count = connections.len();
        connections.clear();
        tracing::info!(connections = count, "Closed all client connections");
    }

    /// Router serving the namespace routes.
    ///
    /// Requests outside the namespace fall through to whatever the returned
    /// router is merged into.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        Router::new()
            .route(
                &self.namespace,
                get(handlers::connect).post(handlers::notify),
            )
            .route(&self.client_script_path(), get(handlers::client_script))
            .with_state(self.clone())
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(BroadcastOptions::default())
    }
}

/// Ensure a namespace starts and ends with `/`.
pub(crate) fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        format!("/{trimmed}/")
    }
}
