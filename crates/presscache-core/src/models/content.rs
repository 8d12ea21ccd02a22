use std::fmt;

use serde::{Deserialize, Serialize};

/// A content item as handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub content: String,
    pub title: String,
}

impl ContentItem {
    pub fn new(content: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            title: title.into(),
        }
    }
}

/// A text field as returned by the content API.
///
/// WordPress wraps rendered fields as `{"rendered": "..."}`; simpler
/// backends return the string directly. Both are accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RenderedText {
    Plain(String),
    Rendered { rendered: String },
}

impl From<RenderedText> for String {
    fn from(text: RenderedText) -> Self {
        match text {
            RenderedText::Plain(s) => s,
            RenderedText::Rendered { rendered } => rendered,
        }
    }
}

/// Internal API response type - use ContentItem for domain code
#[derive(Debug, Deserialize)]
pub(crate) struct ContentResponse {
    content: RenderedText,
    title: RenderedText,
}

impl From<ContentResponse> for ContentItem {
    fn from(resp: ContentResponse) -> Self {
        ContentItem {
            content: resp.content.into(),
            title: resp.title.into(),
        }
    }
}

/// Error for a `(type, id)` pair that cannot be turned into a remote path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} segment: {value:?}")]
pub struct InvalidPath {
    pub field: &'static str,
    pub value: String,
}

/// Remote request path for a content item, `"{type}/{id}"`.
///
/// The same string is the cache key, so two requests share an entry exactly
/// when they would hit the same remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentPath {
    kind: String,
    id: String,
}

impl ContentPath {
    pub fn new(kind: &str, id: &str) -> Result<Self, InvalidPath> {
        Self::check_segment("type", kind)?;
        Self::check_segment("id", id)?;
        Ok(Self {
            kind: kind.to_string(),
            id: id.to_string(),
        })
    }

    /// Segments end up verbatim in the upstream URL, so only a conservative
    /// character set is let through.
    fn check_segment(field: &'static str, value: &str) -> Result<(), InvalidPath> {
        let ok = !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if ok {
            Ok(())
        } else {
            Err(InvalidPath {
                field,
                value: value.to_string(),
            })
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cache key for this path.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
