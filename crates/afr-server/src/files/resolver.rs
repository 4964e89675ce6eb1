//! Request path resolution with static-site fallbacks.
//!
//! A request path expands into an ordered list of [`Candidate`]s. Each
//! candidate is tried against every [`Dir`] in order; the first descriptor
//! that allows the candidate and holds a regular file for it wins.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use afr_core::{Dir, has_parent_segment};
use axum::http::StatusCode;
use axum::response::Response;
use percent_encoding::percent_decode_str;

use super::ContentTypes;
use super::responder::{ResponseOptions, res_exact_file};
use crate::error::ServerError;

/// Which fallbacks to try after the exact path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FallbackMode {
    /// Exact path only.
    #[default]
    File,
    /// Exact path, then `.html`, then `/index.html`.
    Site,
    /// As [`Site`](Self::Site), then `404.html` with a 404 status.
    SiteNotFound,
}

impl FallbackMode {
    fn is_site(self) -> bool {
        matches!(self, Self::Site | Self::SiteNotFound)
    }
}

/// How a candidate was derived from the request path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateKind {
    /// The request path as given.
    Exact,
    /// `.html` appended.
    Html,
    /// `index.html` appended.
    Index,
    /// The site-wide `404.html`.
    NotFound,
}

impl CandidateKind {
    /// Whether the candidate maps 1:1 to the request path.
    pub fn is_exact(self) -> bool {
        matches!(self, Self::Exact)
    }
}

/// One relative path tried during resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub path: String,
    pub kind: CandidateKind,
}

impl Candidate {
    fn new(path: impl Into<String>, kind: CandidateKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// A candidate matched to an existing file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Filesystem path, always under the matching descriptor's root.
    pub path: PathBuf,
    /// Index of the matching descriptor.
    pub dir_index: usize,
    pub candidate: Candidate,
}

impl ResolvedFile {
    /// Status to serve the file with.
    pub fn status(&self) -> StatusCode {
        if self.candidate.kind == CandidateKind::NotFound {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        }
    }
}

/// Build the ordered candidate list for a decoded request path.
pub fn candidates(request_path: &str, mode: FallbackMode) -> Vec<Candidate> {
    let path = if request_path.is_empty() {
        "/"
    } else {
        request_path
    };

    let mut list = vec![Candidate::new(path, CandidateKind::Exact)];

    if mode.is_site() {
        let ends_with_separator = path.ends_with('/');
        let last_segment = path.rsplit('/').next().unwrap_or_default();
        let has_extension = Path::new(last_segment).extension().is_some();

        if !ends_with_separator && !has_extension {
            list.push(Candidate::new(format!("{path}.html"), CandidateKind::Html));
        }

        let index = if ends_with_separator {
            format!("{path}index.html")
        } else {
            format!("{path}/index.html")
        };
        list.push(Candidate::new(index, CandidateKind::Index));
    }

    if mode == FallbackMode::SiteNotFound {
        list.push(Candidate::new("404.html", CandidateKind::NotFound));
    }

    list
}

/// Percent-decode a raw URI path. Returns `None` if it is not UTF-8.
pub fn decode_path(raw: &str) -> Option<Cow<'_, str>> {
    percent_decode_str(raw).decode_utf8().ok()
}

/// Find the first candidate that is allowed by a descriptor and exists.
///
/// `request_path` must already be percent-decoded. Candidates with a `..`
/// segment are skipped without touching the filesystem.
pub async fn resolve_file(
    request_path: &str,
    dirs: &[Dir],
    mode: FallbackMode,
) -> Option<ResolvedFile> {
    for candidate in candidates(request_path, mode) {
        if has_parent_segment(&candidate.path) {
            tracing::debug!(path = %candidate.path, "Rejected candidate with parent segment");
            continue;
        }

        for (dir_index, dir) in dirs.iter().enumerate() {
            if !dir.allow(&candidate.path) {
                continue;
            }
            let Some(path) = dir.resolve(&candidate.path) else {
                continue;
            };
            if is_file(&path).await {
                tracing::debug!(
                    request = request_path,
                    path = %path.display(),
                    kind = ?candidate.kind,
                    "Resolved file"
                );
                return Some(ResolvedFile {
                    path,
                    dir_index,
                    candidate,
                });
            }
        }
    }

    None
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file())
}

/// Resolve a raw request path and stream the matching file.
///
/// Returns `Ok(None)` when nothing matched; the caller decides how to
/// answer. In [`FallbackMode::SiteNotFound`] a matched `404.html` is served
/// with a 404 status regardless of `options.status`.
///
/// # Errors
///
/// Returns [`ServerError::File`] if a resolved file cannot be opened.
pub async fn res_file(
    raw_path: &str,
    dirs: &[Dir],
    mode: FallbackMode,
    content_types: &ContentTypes,
    mut options: ResponseOptions,
) -> Result<Option<Response>, ServerError> {
    let Some(request_path) = decode_path(raw_path) else {
        return Ok(None);
    };

    let Some(resolved) = resolve_file(&request_path, dirs, mode).await else {
        return Ok(None);
    };

    if resolved.candidate.kind == CandidateKind::NotFound || options.status.is_none() {
        options.status = Some(resolved.status());
    }

    res_exact_file(&resolved.path, content_types, options)
        .await
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use afr_core::Filter;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn paths(list: &[Candidate]) -> Vec<&str> {
        list.iter().map(|c| c.path.as_str()).collect()
    }

    fn site() -> tempfile::TempDir {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("target");
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("index.html"), "home").unwrap();
        fs::write(root.join("about.html"), "about").unwrap();
        fs::write(root.join("docs/index.html"), "docs").unwrap();
        fs::write(root.join("style.css"), "css").unwrap();
        fs::write(root.join("404.html"), "not found").unwrap();
        fs::write(temp_dir.path().join("secret.txt"), "secret").unwrap();
        temp_dir
    }

    #[test]
    fn test_candidates_file_mode() {
        assert_eq!(paths(&candidates("/about", FallbackMode::File)), vec!["/about"]);
    }

    #[test]
    fn test_candidates_site_mode() {
        assert_eq!(
            paths(&candidates("/about", FallbackMode::Site)),
            vec!["/about", "/about.html", "/about/index.html"]
        );
    }

    #[test]
    fn test_candidates_skip_html_for_extension() {
        assert_eq!(
            paths(&candidates("/v1.2/style.css", FallbackMode::Site)),
            vec!["/v1.2/style.css", "/v1.2/style.css/index.html"]
        );
    }

    #[test]
    fn test_candidates_skip_html_for_trailing_separator() {
        assert_eq!(
            paths(&candidates("/docs/", FallbackMode::Site)),
            vec!["/docs/", "/docs/index.html"]
        );
        assert_eq!(
            paths(&candidates("", FallbackMode::Site)),
            vec!["/", "/index.html"]
        );
    }

    #[test]
    fn test_candidates_not_found_last() {
        let list = candidates("/missing", FallbackMode::SiteNotFound);
        assert_eq!(
            paths(&list),
            vec!["/missing", "/missing.html", "/missing/index.html", "404.html"]
        );
        assert!(list[0].kind.is_exact());
        assert_eq!(list[3].kind, CandidateKind::NotFound);
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("/a%20b.html").as_deref(), Some("/a b.html"));
        assert_eq!(decode_path("/%2e%2e/secret").as_deref(), Some("/../secret"));
        assert_eq!(decode_path("/%ff"), None);
    }

    #[tokio::test]
    async fn test_site_mode_appends_html() {
        let temp_dir = site();
        let dirs = [Dir::new(temp_dir.path().join("target"))];

        let resolved = resolve_file("/about", &dirs, FallbackMode::Site)
            .await
            .unwrap();

        assert_eq!(resolved.candidate.kind, CandidateKind::Html);
        assert_eq!(resolved.path, temp_dir.path().join("target/about.html"));
        assert_eq!(resolved.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_file_mode_has_no_fallbacks() {
        let temp_dir = site();
        let dirs = [Dir::new(temp_dir.path().join("target"))];

        assert!(resolve_file("/about", &dirs, FallbackMode::File).await.is_none());
        assert!(
            resolve_file("/about.html", &dirs, FallbackMode::File)
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_directory_is_not_a_match() {
        let temp_dir = site();
        let dirs = [Dir::new(temp_dir.path().join("target"))];

        let resolved = resolve_file("/docs", &dirs, FallbackMode::Site)
            .await
            .unwrap();
        assert_eq!(resolved.candidate.kind, CandidateKind::Index);

        let resolved = resolve_file("/", &dirs, FallbackMode::Site).await.unwrap();
        assert_eq!(resolved.path, temp_dir.path().join("target/index.html"));
    }

    #[tokio::test]
    async fn test_not_found_mode_serves_404_page() {
        let temp_dir = site();
        let dirs = [Dir::new(temp_dir.path().join("target"))];

        let resolved = resolve_file("/missing", &dirs, FallbackMode::SiteNotFound)
            .await
            .unwrap();

        assert_eq!(resolved.candidate.kind, CandidateKind::NotFound);
        assert_eq!(resolved.path, temp_dir.path().join("target/404.html"));
        assert_eq!(resolved.status(), StatusCode::NOT_FOUND);

        assert!(
            resolve_file("/missing", &dirs, FallbackMode::Site)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_parent_segments_never_match() {
        let temp_dir = site();
        let dirs = [Dir::new(temp_dir.path().join("target"))];

        for path in ["/../secret.txt", "/docs/../../secret.txt", "..", "/..\\secret.txt"] {
            assert!(
                resolve_file(path, &dirs, FallbackMode::Site).await.is_none(),
                "{path} escaped the root"
            );
        }
    }

    #[tokio::test]
    async fn test_filter_and_order_across_dirs() {
        let temp_dir = site();
        let public = temp_dir.path().join("public");
        fs::create_dir_all(&public).unwrap();
        fs::write(public.join("about.html"), "public about").unwrap();
        fs::write(public.join("robots.txt"), "robots").unwrap();

        let target = Dir::new(temp_dir.path().join("target"))
            .with_filter(Filter::predicate(|p| !p.starts_with("about")));
        let dirs = [target, Dir::new(&public)];

        // Filtered out of the first dir, found in the second.
        let resolved = resolve_file("/about.html", &dirs, FallbackMode::File)
            .await
            .unwrap();
        assert_eq!(resolved.dir_index, 1);
        assert_eq!(resolved.path, public.join("about.html"));

        // Found in the first dir before the second is consulted.
        let resolved = resolve_file("/style.css", &dirs, FallbackMode::File)
            .await
            .unwrap();
        assert_eq!(resolved.dir_index, 0);
    }

    #[tokio::test]
    async fn test_res_file_serves_not_found_status() {
        let temp_dir = site();
        let dirs = [Dir::new(temp_dir.path().join("target"))];
        let options = ResponseOptions {
            status: Some(StatusCode::OK),
            ..ResponseOptions::default()
        };

        let response = res_file(
            "/missing",
            &dirs,
            FallbackMode::SiteNotFound,
            &ContentTypes::default(),
            options,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_res_file_decodes_before_resolving() {
        let temp_dir = site();
        let dirs = [Dir::new(temp_dir.path().join("target"))];
        let types = ContentTypes::default();

        let response = res_file(
            "/%61bout",
            &dirs,
            FallbackMode::Site,
            &types,
            ResponseOptions::default(),
        )
        .await
        .unwrap();
        assert!(response.is_some());

        let response = res_file(
            "/%2e%2e/secret.txt",
            &dirs,
            FallbackMode::File,
            &types,
            ResponseOptions::default(),
        )
        .await
        .unwrap();
        assert!(response.is_none());
    }
}
