//! The documents a page wants displayed.

use crate::markup::Strings;
use derive_more::Display;

/// Where on the page a target was found.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A container carrying `data-pdf-src`; the viewer shell is built inside it.
    #[display("container")]
    Container,
    /// A stand-alone `iframe` already pointing at a PDF.
    #[display("iframe")]
    Iframe,
}

/// A display element plus the PDF it should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedTarget {
    /// Element id; generated when the page did not provide one.
    pub id: String,
    pub kind: TargetKind,
    /// PDF location as written in the page, possibly relative.
    pub src: String,
    pub title: Option<String>,
    pub author: Option<String>,
}
impl EmbedTarget {
    pub fn new(id: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TargetKind::Container,
            src: src.into(),
            title: None,
            author: None,
        }
    }

    pub fn with_kind(mut self, kind: TargetKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the title; an empty value counts as missing.
    pub fn with_title(mut self, title: Option<impl Into<String>>) -> Self {
        self.title = title.map(Into::into).filter(|t: &String| !t.is_empty());
        self
    }

    /// Set the author; an empty value counts as missing.
    pub fn with_author(mut self, author: Option<impl Into<String>>) -> Self {
        self.author = author.map(Into::into).filter(|a: &String| !a.is_empty());
        self
    }

    /// Title and byline shown above the document, with defaults filled in.
    pub fn header(&self, strings: &Strings) -> Header {
        let author = self.author.as_deref().unwrap_or(&strings.default_author);
        Header {
            title: self.title.clone().unwrap_or_else(|| strings.default_title.clone()),
            byline: format!("{} {author}", strings.byline),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub byline: String,
}
