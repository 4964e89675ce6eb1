//! Error types for remote notification.

/// Error sending a message to a broadcaster.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Nothing is listening at the target: the connect was refused or failed.
    #[error("failed to connect to {url}")]
    Connection {
        url: String,
        #[source]
        source: ureq::Error,
    },

    /// The request failed after a connection was made (timeout, protocol).
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: ureq::Error,
    },

    /// The broadcaster answered with a non-success status.
    #[error("HTTP error: {status} - {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (may contain error details).
        body: String,
    },

    /// The message could not be encoded.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),
}

impl NotifyError {
    /// Whether the target was unreachable.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Whether a transport error means "no listener at the target".
///
/// Only failed connects count. An unknown host, or a connection dropped
/// after it was made, is a real error.
pub(crate) fn is_unreachable(error: &ureq::Error) -> bool {
    use std::io::ErrorKind;

    match error {
        ureq::Error::ConnectionFailed => true,
        ureq::Error::Io(e) => matches!(
            e.kind(),
            ErrorKind::ConnectionRefused | ErrorKind::AddrNotAvailable
        ),
        _ => false,
    }
}
