//! Streaming responses for already-resolved files.

use std::path::Path;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use super::ContentTypes;
use crate::error::ServerError;

/// Overrides applied to a file response.
#[derive(Clone, Debug, Default)]
pub struct ResponseOptions {
    /// Status code (default `200 OK`).
    pub status: Option<StatusCode>,
    /// Extra headers. A `Content-Type` here wins over the table lookup.
    pub headers: HeaderMap,
}

/// Stream one file as a response.
///
/// `path` must already be resolved and trusted; it is opened as given. The
/// file handle lives in the response body and is closed when the body is
/// drained or dropped, so whoever serves the response owns that obligation.
///
/// # Errors
///
/// Returns [`ServerError::File`] if the file cannot be opened.
pub async fn res_exact_file(
    path: &Path,
    content_types: &ContentTypes,
    options: ResponseOptions,
) -> Result<Response, ServerError> {
    let file_error = |source| ServerError::File {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).await.map_err(file_error)?;
    let len = file.metadata().await.map_err(file_error)?.len();

    let mut headers = options.headers;
    if !headers.contains_key(header::CONTENT_TYPE)
        && let Some(mime) = content_types.lookup(path)
        && let Ok(value) = HeaderValue::from_str(&mime)
    {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers
        .entry(header::CONTENT_LENGTH)
        .or_insert_with(|| HeaderValue::from(len));

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = options.status.unwrap_or(StatusCode::OK);
    *response.headers_mut() = headers;

    Ok(response)
}
