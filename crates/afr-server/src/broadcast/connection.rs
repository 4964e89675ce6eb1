//! Per-connection message stream.

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::{ConnectionId, Registry};

/// Messages for one registered connection, as serialized JSON.
///
/// Dropping the stream closes the connection and removes it from the
/// registry if a failed write has not already done so.
pub struct ConnectionStream {
    id: ConnectionId,
    rx: mpsc::Receiver<Arc<str>>,
    registry: Weak<Registry>,
}

impl ConnectionStream {
    pub(crate) fn new(
        id: ConnectionId,
        rx: mpsc::Receiver<Arc<str>>,
        registry: Weak<Registry>,
    ) -> Self {
        Self { id, rx, registry }
    }

    /// Registry-assigned connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop accepting writes while staying registered, as a vanished client
    /// would. The next broadcast detects the failure.
    #[cfg(test)]
    pub(crate) fn close_receiver(&mut self) {
        self.rx.close();
    }
}

impl Stream for ConnectionStream {
    type Item = Arc<str>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ConnectionStream {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id, "closed");
        }
    }
}
