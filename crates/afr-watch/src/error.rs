//! Watcher error types.

use std::path::PathBuf;

/// Error starting a change watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The watch path could not be resolved.
    #[error("cannot watch {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The platform watcher could not be created or attached.
    #[error("cannot watch {}: {source}", path.display())]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}
