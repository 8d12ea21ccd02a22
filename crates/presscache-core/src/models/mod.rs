//! Data models for content served through the proxy.
//!
//! - `ContentItem`: the `{content, title}` pair handed to the presentation layer
//! - `ContentPath`: validated `(type, id)` pair, doubling as the cache key

pub mod content;

pub(crate) use content::ContentResponse;
pub use content::{ContentItem, ContentPath, InvalidPath};
