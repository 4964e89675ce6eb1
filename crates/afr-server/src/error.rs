//! Error types for the HTTP server.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A resolved file could not be opened or read. The file existed during
    /// resolution, so this is an environment problem rather than a 404.
    #[error("failed to open {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The listener could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A change watcher could not be started.
    #[error(transparent)]
    Watch(#[from] afr_watch::WatchError),

    /// A configured include pattern is not a valid glob.
    #[error("invalid include pattern for {}: {source}", dir.display())]
    Filter {
        dir: PathBuf,
        #[source]
        source: afr_core::FilterError,
    },
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_is_server_error() {
        let err = ServerError::File {
            path: PathBuf::from("site/index.html"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };

        assert_eq!(err.to_string(), "failed to open site/index.html: gone");
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
