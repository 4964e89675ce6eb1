//! Static file serving over directory descriptors.
//!
//! - [`resolve_file`] / [`res_file`]: fallback-chain resolution
//! - [`res_exact_file`]: stream one already-resolved file
//! - [`FileServer`]: the same as an axum fallback router

mod content_type;
mod resolver;
mod responder;

use std::sync::Arc;

use afr_core::Dir;
use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

pub use content_type::ContentTypes;
pub use resolver::{
    Candidate, CandidateKind, FallbackMode, ResolvedFile, candidates, decode_path, res_file,
    resolve_file,
};
pub use responder::{ResponseOptions, res_exact_file};

use crate::error::ServerError;

/// Serves files from an ordered list of directory descriptors.
#[derive(Clone, Debug)]
pub struct FileServer {
    dirs: Arc<[Dir]>,
    mode: FallbackMode,
    content_types: Arc<ContentTypes>,
}

impl FileServer {
    /// Serve exact paths from `dirs` with the default content types.
    pub fn new(dirs: Vec<Dir>) -> Self {
        Self {
            dirs: dirs.into(),
            mode: FallbackMode::File,
            content_types: Arc::new(ContentTypes::default()),
        }
    }

    /// Set the fallback mode.
    #[must_use]
    pub fn with_mode(mut self, mode: FallbackMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the content type table.
    #[must_use]
    pub fn with_content_types(mut self, content_types: ContentTypes) -> Self {
        self.content_types = Arc::new(content_types);
        self
    }

    /// Resolve and stream a raw request path. `Ok(None)` means no match.
    pub async fn respond(&self, raw_path: &str) -> Result<Option<Response>, ServerError> {
        res_file(
            raw_path,
            &self.dirs,
            self.mode,
            &self.content_types,
            ResponseOptions::default(),
        )
        .await
    }

    /// Router that answers every request it sees from the file list.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        Router::new().fallback(serve).with_state(self.clone())
    }
}

/// Serve a file or answer 404.
async fn serve(State(files): State<FileServer>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    match files.respond(uri.path()).await {
        Ok(Some(response)) => response,
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => e.into_response(),
    }
}
