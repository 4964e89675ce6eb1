//! Directory descriptors.
//!
//! A [`Dir`] pairs a root directory with a [`Filter`] over paths relative to
//! that root. Both file serving and change watching go through it, so it is
//! the single place where path traversal is rejected.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

/// Error building a [`Filter`] from a pattern string.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
    #[error("invalid glob: {0}")]
    Glob(#[from] glob::PatternError),
}

/// Allow-predicate over directory-relative paths.
///
/// Paths passed to the filter are POSIX-style, already percent-decoded, and
/// carry no leading `/` (e.g. `css/site.css`).
#[derive(Clone, Default)]
pub enum Filter {
    /// Allow every path.
    #[default]
    All,
    /// Allow paths matched anywhere by the regex.
    Regex(Regex),
    /// Allow paths matched by the glob pattern.
    Glob(glob::Pattern),
    /// Allow paths for which the function returns `true`. Must be pure.
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Filter {
    /// Build a regex filter.
    pub fn regex(pattern: &str) -> Result<Self, FilterError> {
        Ok(Self::Regex(Regex::new(pattern)?))
    }

    /// Build a glob filter (e.g. `**/*.html`).
    pub fn glob(pattern: &str) -> Result<Self, FilterError> {
        Ok(Self::Glob(glob::Pattern::new(pattern)?))
    }

    /// Build a predicate filter.
    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    fn matches(&self, relative: &str) -> bool {
        match self {
            Self::All => true,
            Self::Regex(re) => re.is_match(relative),
            Self::Glob(pattern) => pattern.matches(relative),
            Self::Predicate(f) => f(relative),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Glob(pattern) => f.debug_tuple("Glob").field(&pattern.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<Regex> for Filter {
    fn from(re: Regex) -> Self {
        Self::Regex(re)
    }
}

impl From<glob::Pattern> for Filter {
    fn from(pattern: glob::Pattern) -> Self {
        Self::Glob(pattern)
    }
}

/// Check whether a slash- or backslash-separated path has a `..` segment.
pub fn has_parent_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == "..")
}

#[cfg(windows)]
const SEPARATORS: &[char] = &['/', '\\'];
#[cfg(not(windows))]
const SEPARATORS: &[char] = &['/'];

/// Clean a relative path: drop empty and `.` segments, join with `/`.
///
/// Returns `None` if any segment is `..`. `/./a//b/` becomes `a/b`.
pub fn normalize_relative(path: &str) -> Option<String> {
    if has_parent_segment(path) {
        return None;
    }
    let segments: Vec<&str> = path
        .split(SEPARATORS)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    Some(segments.join("/"))
}

/// Root directory plus allow filter.
///
/// Immutable after construction and cheap to clone.
#[derive(Clone, Debug)]
pub struct Dir {
    root: PathBuf,
    filter: Filter,
}

impl Dir {
    /// Create a descriptor that allows every path under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            filter: Filter::All,
        }
    }

    /// Replace the allow filter.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Same filter, different root. Used when roots are canonicalized.
    #[must_use]
    pub fn with_root(&self, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            filter: self.filter.clone(),
        }
    }

    /// Check whether a relative path is visible through this descriptor.
    ///
    /// The filter sees the [normalized](normalize_relative) path, so `.` and
    /// empty segments cannot dodge it. Paths with a `..` segment are never
    /// allowed.
    pub fn allow(&self, relative: &str) -> bool {
        normalize_relative(relative).is_some_and(|relative| self.filter.matches(&relative))
    }

    /// Join a relative path onto the root.
    ///
    /// Returns `None` if the path could land outside the root: it has a `..`
    /// segment, or a root/prefix component. The filter is not consulted and
    /// the filesystem is never touched.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = normalize_relative(relative)?;

        let relative = Path::new(&relative);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !contained {
            return None;
        }

        let full = self.root.join(relative);
        full.starts_with(&self.root).then_some(full)
    }

    /// Map an absolute path under the root to a `/`-separated relative path.
    ///
    /// Returns `None` if `path` is not under the root.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rest = path.strip_prefix(&self.root).ok()?;
        let segments = rest
            .components()
            .map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        Some(segments.join("/"))
    }
}
