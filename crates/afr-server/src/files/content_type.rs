//! Extension to MIME type lookup.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

/// Immutable extension → MIME type table.
///
/// The default table pins a few types browsers are picky about and falls
/// back to [`mime_guess`] for everything else. A table built with
/// [`from_table`](Self::from_table) only knows what it was given.
#[derive(Clone, Debug)]
pub struct ContentTypes {
    table: HashMap<String, String>,
    guess: bool,
}

impl ContentTypes {
    /// Table with exactly these entries and no guessing fallback.
    pub fn from_table<I, E, M>(entries: I) -> Self
    where
        I: IntoIterator<Item = (E, M)>,
        E: AsRef<str>,
        M: Into<String>,
    {
        Self {
            table: entries
                .into_iter()
                .map(|(ext, mime)| (ext.as_ref().to_ascii_lowercase(), mime.into()))
                .collect(),
            guess: false,
        }
    }

    /// Copy of this table with one entry added or replaced.
    #[must_use]
    pub fn with(mut self, ext: &str, mime: impl Into<String>) -> Self {
        self.table.insert(ext.to_ascii_lowercase(), mime.into());
        self
    }

    /// MIME type for a path, or `None` for unknown extensions.
    pub fn lookup(&self, path: &Path) -> Option<Cow<'_, str>> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();

        if let Some(mime) = self.table.get(&ext) {
            return Some(Cow::Borrowed(mime));
        }

        if self.guess {
            return mime_guess::from_ext(&ext)
                .first()
                .map(|mime| Cow::Owned(mime.to_string()));
        }

        None
    }
}

impl Default for ContentTypes {
    fn default() -> Self {
        let mut types = Self::from_table([
            ("html", "text/html; charset=utf-8"),
            ("htm", "text/html; charset=utf-8"),
            ("css", "text/css; charset=utf-8"),
            ("js", "text/javascript; charset=utf-8"),
            ("mjs", "text/javascript; charset=utf-8"),
            ("json", "application/json"),
            ("map", "application/json"),
            ("svg", "image/svg+xml"),
            ("wasm", "application/wasm"),
        ]);
        types.guess = true;
        types
    }
}
