//! Mapping raw filesystem events to messages.

use std::path::Path;

use afr_core::{Dir, Message};
use notify::{Event, EventKind};

/// Maps absolute event paths to directory-relative `change` messages.
///
/// Each path is owned by the first descriptor (in list order) whose root
/// contains it. Only that descriptor's filter is consulted.
#[derive(Clone, Debug)]
pub struct EventMapper {
    dirs: Vec<Dir>,
}

impl EventMapper {
    /// Create a mapper over the given descriptors.
    pub fn new(dirs: Vec<Dir>) -> Self {
        Self { dirs }
    }

    /// Descriptors in match order.
    pub fn dirs(&self) -> &[Dir] {
        &self.dirs
    }

    /// Map one raw event to zero or more messages.
    ///
    /// Only create, modify and remove events produce messages.
    pub fn map(&self, event: &Event) -> Vec<Message> {
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return Vec::new();
        }

        event
            .paths
            .iter()
            .filter_map(|path| self.map_path(path))
            .collect()
    }

    /// Map a single absolute path.
    pub fn map_path(&self, path: &Path) -> Option<Message> {
        let Some((dir, relative)) = self
            .dirs
            .iter()
            .find_map(|dir| dir.relative(path).map(|rel| (dir, rel)))
        else {
            tracing::debug!(path = %path.display(), "Dropped change outside watched directories");
            return None;
        };

        if !dir.allow(&relative) {
            tracing::debug!(path = %relative, root = %dir.root().display(), "Dropped filtered change");
            return None;
        }

        Some(Message::change(relative))
    }
}
