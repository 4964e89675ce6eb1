//! Filesystem change watching for afr.
//!
//! [`watch`] wraps a [`notify`] watcher and turns raw filesystem events into
//! [`Message`](afr_core::Message)s relative to a list of
//! [`Dir`](afr_core::Dir) descriptors. Events outside every descriptor, or
//! rejected by the owning descriptor's filter, are dropped silently.
//!
//! # Example
//!
//! ```ignore
//! use afr_core::Dir;
//! use afr_watch::{WatchOptions, watch};
//! use futures::StreamExt;
//!
//! let mut changes = watch("site", &[Dir::new("site")], WatchOptions::default())?;
//! while let Some(message) = changes.next().await {
//!     broadcaster.broadcast(&message).await;
//! }
//! ```
//!
//! # Cancellation
//!
//! The OS watch handle is released when the stream is dropped, when
//! [`ChangeStream::close`] is called, or when the [`CancellationToken`]
//! passed in [`WatchOptions::cancel`] fires.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod error;
mod event;
mod watcher;

pub use error::WatchError;
pub use event::EventMapper;
pub use watcher::{ChangeStream, DEFAULT_DEBOUNCE, WatchOptions, watch};
