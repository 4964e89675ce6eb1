//! HTTP server for afr.
//!
//! This crate provides the development server built on axum:
//! - Live reload broadcaster under a namespace (default `/afr/`)
//! - Static files from an ordered list of directory descriptors
//! - Change watchers that feed the broadcaster
//!
//! # Quick Start
//!
//! ```ignore
//! use afr_core::Dir;
//! use afr_server::{FallbackMode, ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         dirs: vec![Dir::new("target")],
//!         mode: FallbackMode::SiteNotFound,
//!         watch_paths: vec!["target".into()],
//!         ..ServerConfig::default()
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──SSE───► GET  {namespace}           ◄── Broadcaster ◄── ChangeStream (afr-watch)
//! Tools ───POST───► POST {namespace}           ──►      │
//! Browser ──HTTP──► GET  {namespace}client.mjs          │
//!                   GET  /* ──► FileServer (Dir list, fallback chain)
//! ```
//!
//! # Known limitations
//!
//! `POST {namespace}` is unauthenticated. Anyone who can reach the port can
//! make every connected tab reload, so bind to loopback unless the network
//! is trusted.

mod app;
mod broadcast;
mod error;
mod files;
mod middleware;

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use afr_core::{Dir, Filter};
use afr_watch::{ChangeStream, WatchOptions};
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use app::create_router;
pub use broadcast::{
    BroadcastOptions, Broadcaster, ConnectionStream, DEFAULT_CLIENT_PATH, DEFAULT_NAMESPACE,
};
pub use error::ServerError;
pub use files::{
    Candidate, CandidateKind, ContentTypes, FallbackMode, FileServer, ResolvedFile,
    ResponseOptions, candidates, decode_path, res_exact_file, res_file, resolve_file,
};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Broadcaster routing.
    pub broadcast: BroadcastOptions,
    /// Served directories, in lookup order. Empty disables file serving.
    pub dirs: Vec<Dir>,
    /// Fallback mode for file serving.
    pub mode: FallbackMode,
    /// Extension to MIME type table.
    pub content_types: ContentTypes,
    /// Paths to watch. Empty disables watching.
    pub watch_paths: Vec<PathBuf>,
    /// Coalescing window for watch events.
    pub debounce: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            broadcast: BroadcastOptions::default(),
            dirs: Vec::new(),
            mode: FallbackMode::File,
            content_types: ContentTypes::default(),
            watch_paths: Vec::new(),
            debounce: afr_watch::DEFAULT_DEBOUNCE,
        }
    }
}

/// Run the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound, a watcher cannot be
/// started, or the server stops with an I/O error.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let address = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ServerError::Bind { address, source })?;

    let broadcaster = Broadcaster::new(config.broadcast.clone());
    serve(listener, &config, broadcaster, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// `config.host`, `config.port` and `config.broadcast` are ignored here; the
/// listener and `broadcaster` already carry them. On shutdown the watchers
/// are cancelled and every event stream is closed so in-flight connections
/// can drain.
///
/// # Errors
///
/// Returns an error if a watcher cannot be started or the server stops with
/// an I/O error.
pub async fn serve<F>(
    listener: TcpListener,
    config: &ServerConfig,
    broadcaster: Broadcaster,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let watchers = spawn_watchers(config, &broadcaster, &cancel)?;

    let files = (!config.dirs.is_empty()).then(|| {
        FileServer::new(config.dirs.clone())
            .with_mode(config.mode)
            .with_content_types(config.content_types.clone())
    });
    let app = create_router(&broadcaster, files.as_ref());

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(
            address = %addr,
            client = %broadcaster.client_script_path(),
            dirs = config.dirs.len(),
            watchers = watchers.len(),
            "Starting server"
        );
    }

    let stop = {
        let cancel = cancel.clone();
        let broadcaster = broadcaster.clone();
        async move {
            shutdown.await;
            cancel.cancel();
            broadcaster.close();
        }
    };

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(stop)
        .await;

    cancel.cancel();
    for watcher in watchers {
        if let Err(e) = watcher.await {
            tracing::warn!(error = %e, "Watcher task failed");
        }
    }

    result.map_err(ServerError::from)
}

/// Start one watcher per configured path, each forwarding to `broadcaster`.
fn spawn_watchers(
    config: &ServerConfig,
    broadcaster: &Broadcaster,
    cancel: &CancellationToken,
) -> Result<Vec<JoinHandle<()>>, ServerError> {
    let mut streams = Vec::with_capacity(config.watch_paths.len());
    for path in &config.watch_paths {
        let opts = WatchOptions {
            recursive: true,
            debounce: config.debounce,
            cancel: Some(cancel.child_token()),
        };
        streams.push(afr_watch::watch(path, &config.dirs, opts)?);
    }

    Ok(streams
        .into_iter()
        .map(|stream| tokio::spawn(forward_changes(stream, broadcaster.clone())))
        .collect())
}

async fn forward_changes(mut changes: ChangeStream, broadcaster: Broadcaster) {
    while let Some(message) = changes.next().await {
        broadcaster.broadcast(&message);
    }
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a handler the server runs until killed
        tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from afr config.
///
/// # Errors
///
/// Returns [`ServerError::Filter`] if a directory's include pattern is not a
/// valid glob.
pub fn server_config_from_config(config: &afr_config::Config) -> Result<ServerConfig, ServerError> {
    let dirs = config
        .files
        .dirs
        .iter()
        .map(|dir| {
            let filter = match &dir.include {
                Some(pattern) => Filter::glob(pattern).map_err(|source| ServerError::Filter {
                    dir: dir.path.clone(),
                    source,
                })?,
                None => Filter::All,
            };
            Ok(Dir::new(&dir.path).with_filter(filter))
        })
        .collect::<Result<Vec<_>, ServerError>>()?;

    let mode = match config.files.mode {
        afr_config::ServeMode::File => FallbackMode::File,
        afr_config::ServeMode::Site => FallbackMode::Site,
        afr_config::ServeMode::SiteNotFound => FallbackMode::SiteNotFound,
    };

    Ok(ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        broadcast: BroadcastOptions {
            namespace: config.server.namespace.clone(),
            client_path: config.server.client_path.clone(),
        },
        dirs,
        mode,
        content_types: ContentTypes::default(),
        watch_paths: config.watch.paths.clone(),
        debounce: Duration::from_millis(config.watch.debounce_ms),
    })
}
