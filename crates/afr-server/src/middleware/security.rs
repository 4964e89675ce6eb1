//! Security headers middleware.
//!
//! Adds `X-Content-Type-Options: nosniff` so browsers trust the content type
//! inferred from the file table instead of sniffing file bodies.

use axum::http::HeaderValue;
use axum::http::header::HeaderName;
use tower_http::set_header::SetResponseHeaderLayer;

/// Create layer that adds X-Content-Type-Options header.
pub(crate) fn content_type_options_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    )
}
