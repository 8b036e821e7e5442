//! Embed Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Resolution itself never fails: every failed strategy is absorbed by the
//! fallback chain. These kinds cover building the pieces (bad source URLs,
//! broken templates) and the strategy failures recorded along the way.

use derive_more::{Display, Error};

/// An embed error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for embed operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The `data-pdf-src` (or iframe `src`) could not be resolved to a URL.
    #[display("invalid PDF source: {_0}")]
    InvalidSource(#[error(not(source))] String),
    /// A markup template failed to compile or render.
    #[display("markup template error")]
    Template,
    /// A network strategy completed with a non-OK status.
    #[display("strategy answered with status {_0}")]
    Status(#[error(not(source))] u16),
    /// A network strategy never got a response.
    #[display("strategy fetch failed")]
    Fetch,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch)
    }
}
