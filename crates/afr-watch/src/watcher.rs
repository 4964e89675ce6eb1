//! Cancellable stream of change messages.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use afr_core::{Dir, Message};
use futures::Stream;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::error::WatchError;
use crate::event::EventMapper;

/// Default coalescing window for repeated changes to one path.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Capacity of the channel between the notify callback and the stream.
const EVENT_BUFFER: usize = 100;

/// Options for [`watch`].
#[derive(Clone, Debug)]
pub struct WatchOptions {
    /// Watch subdirectories too.
    pub recursive: bool,
    /// Changes to the same path within this window are yielded once.
    /// `Duration::ZERO` yields every change as it arrives.
    pub debounce: Duration,
    /// Ends the stream and releases the OS watch handle when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            debounce: DEFAULT_DEBOUNCE,
            cancel: None,
        }
    }
}

/// Watch `path` and yield `change` messages relative to `dirs`.
///
/// With an empty `dirs`, a single allow-all descriptor rooted at `path` is
/// used. Descriptor roots are canonicalized so they line up with the
/// absolute paths the platform reports.
///
/// Must be called from within a tokio runtime.
pub fn watch(
    path: impl AsRef<Path>,
    dirs: &[Dir],
    opts: WatchOptions,
) -> Result<ChangeStream, WatchError> {
    let path = path.as_ref();
    let watch_root = fs::canonicalize(path).map_err(|source| WatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let dirs = if dirs.is_empty() {
        vec![Dir::new(&watch_root)]
    } else {
        dirs.iter()
            .map(|dir| dir.with_root(canonical_or_absolute(dir.root())))
            .collect()
    };

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        // The callback runs on notify's own thread; a send error means the
        // stream is gone and the watcher is about to be dropped.
        let _ = tx.blocking_send(res);
    })
    .map_err(|source| WatchError::Notify {
        path: watch_root.clone(),
        source,
    })?;

    let mode = if opts.recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher
        .watch(&watch_root, mode)
        .map_err(|source| WatchError::Notify {
            path: watch_root.clone(),
            source,
        })?;

    tracing::info!(path = %watch_root.display(), dirs = dirs.len(), "Watching for changes");

    Ok(ChangeStream::new(
        rx,
        Some(watcher),
        EventMapper::new(dirs),
        opts,
    ))
}

fn canonical_or_absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Lazy, infinite, non-restartable stream of change messages.
///
/// Holds the OS watch handle. The handle is released exactly once: on
/// [`close`](Self::close), on cancellation, or on drop.
pub struct ChangeStream {
    rx: mpsc::Receiver<Result<Event, notify::Error>>,
    watcher: Option<RecommendedWatcher>,
    mapper: EventMapper,
    debounce: Duration,
    /// Messages waiting for the coalescing window to close.
    pending: Vec<Message>,
    deadline: Option<Pin<Box<Sleep>>>,
    ready: VecDeque<Message>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    closed: bool,
}

impl ChangeStream {
    fn new(
        rx: mpsc::Receiver<Result<Event, notify::Error>>,
        watcher: Option<RecommendedWatcher>,
        mapper: EventMapper,
        opts: WatchOptions,
    ) -> Self {
        Self {
            rx,
            watcher,
            mapper,
            debounce: opts.debounce,
            pending: Vec::new(),
            deadline: None,
            ready: VecDeque::new(),
            cancelled: opts.cancel.map(|token| Box::pin(token.cancelled_owned())),
            closed: false,
        }
    }

    /// Stop watching and release the OS watch handle.
    ///
    /// Buffered messages are discarded; the stream yields `None` afterwards.
    /// Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.watcher.take();
        self.rx.close();
        self.pending.clear();
        self.ready.clear();
        self.deadline = None;
        self.cancelled = None;
        tracing::debug!("Change watcher closed");
    }

    /// Whether the stream has ended.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn enqueue(&mut self, message: Message) {
        if self.debounce.is_zero() {
            self.ready.push_back(message);
            return;
        }

        if !self.pending.contains(&message) {
            self.pending.push(message);
        }

        let deadline = Instant::now() + self.debounce;
        match &mut self.deadline {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.deadline = Some(Box::pin(tokio::time::sleep_until(deadline))),
        }
    }
}

impl Stream for ChangeStream {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        let this = &mut *self;

        if this.closed {
            return Poll::Ready(None);
        }

        if let Some(cancelled) = this.cancelled.as_mut()
            && cancelled.as_mut().poll(cx).is_ready()
        {
            this.close();
            return Poll::Ready(None);
        }

        loop {
            if let Some(message) = this.ready.pop_front() {
                return Poll::Ready(Some(message));
            }

            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    for message in this.mapper.map(&event) {
                        this.enqueue(message);
                    }
                    continue;
                }
                Poll::Ready(Some(Err(e))) => {
                    tracing::warn!(error = %e, "Filesystem watcher error");
                    continue;
                }
                Poll::Ready(None) => {
                    this.close();
                    return Poll::Ready(None);
                }
                Poll::Pending => {}
            }

            if let Some(deadline) = this.deadline.as_mut()
                && deadline.as_mut().poll(cx).is_ready()
            {
                this.deadline = None;
                this.ready.extend(this.pending.drain(..));
                continue;
            }

            return Poll::Pending;
        }
    }
}
