//! Fetch response model.

use bytes::Bytes;
use derive_more::Display;
use reqwest::Url;

/// How much of the response the caller is allowed to see.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// Same-origin response; everything is visible.
    #[display("basic")]
    Basic,
    /// Cross-origin response the server opted into sharing.
    #[display("cors")]
    Cors,
    /// Cross-origin `no-cors` response. Status is reported as `0` and the
    /// body is empty, whatever the server actually sent.
    #[display("opaque")]
    Opaque,
}
impl ResponseKind {
    /// Parse the [`Display`] form back into a kind.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "basic" => Some(Self::Basic),
            "cors" => Some(Self::Cors),
            "opaque" => Some(Self::Opaque),
            _ => None,
        }
    }
}

/// A completed fetch.
///
/// Cloning is cheap: the body is reference-counted [`Bytes`], so "store a
/// clone in the cache and hand the original back" costs no copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}
impl Response {
    /// A readable same-origin response.
    pub fn basic(url: Url, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url,
            status,
            kind: ResponseKind::Basic,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// A readable cross-origin response.
    pub fn cors(url: Url, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            kind: ResponseKind::Cors,
            ..Self::basic(url, status, body)
        }
    }

    /// An opaque response: nothing about the outcome is observable.
    pub fn opaque(url: Url) -> Self {
        Self {
            url,
            status: 0,
            kind: ResponseKind::Opaque,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        // Opaque responses never expose headers.
        if self.kind != ResponseKind::Opaque {
            self.headers.push((name.into(), value.into()));
        }
        self
    }

    /// Whether the status is in the `200..=299` range. Always `false` for
    /// opaque responses, whose real status is hidden.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_opaque(&self) -> bool {
        self.kind == ResponseKind::Opaque
    }

    /// Looks up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}
