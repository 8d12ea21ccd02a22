//! HTML pages for content and errors.

use std::error::Error as _;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use presscache_core::{FetchError, Fetched, Freshness};

/// Header carrying the cache age when a stale copy is served.
pub const STALE_HEADER: HeaderName = HeaderName::from_static("x-presscache-stale");

/// Escape text for use inside HTML element content or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Drop markup from a rendered title so it can go into `<title>`.
pub fn strip_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(&strip_html(title)),
        body
    )
}

/// Render a content item. Title and content are already-rendered HTML from
/// the upstream and are inserted as-is.
pub fn content_page(fetched: &Fetched) -> Response {
    let body = format!(
        "<article>\n<h1>{}</h1>\n{}\n</article>",
        fetched.item.title, fetched.item.content
    );
    let mut response = Html(page(&fetched.item.title, &body)).into_response();

    if let Freshness::Stale { age } = &fetched.freshness {
        if let Ok(value) = HeaderValue::from_str(age) {
            response.headers_mut().insert(STALE_HEADER, value);
        }
    }
    response
}

pub fn error_page(status: StatusCode, message: &str, cause: Option<&str>) -> Response {
    let mut body = format!("<h1>{}</h1>", escape_html(message));
    if let Some(cause) = cause {
        body.push_str(&format!("\n<pre>{}</pre>", escape_html(cause)));
    }
    (status, Html(page(message, &body))).into_response()
}

/// Status and message shown for a failed read.
pub fn describe(err: &FetchError) -> (StatusCode, &'static str) {
    match err {
        FetchError::NoSessionAvailable => (StatusCode::SERVICE_UNAVAILABLE, "No open session"),
        FetchError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
        FetchError::ContentFetchFailed { source, .. } if source.is_not_found() => {
            (StatusCode::NOT_FOUND, "Failed to load content")
        }
        FetchError::ContentFetchFailed { .. } => (StatusCode::BAD_GATEWAY, "Failed to load content"),
    }
}

/// Error page for a failed read, with the error chain as the cause.
pub fn fetch_error_page(err: &FetchError) -> Response {
    let (status, message) = describe(err);
    let mut cause = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        cause.push_str(": ");
        cause.push_str(&inner.to_string());
        source = inner.source();
    }
    error_page(status, message, Some(&cause))
}
