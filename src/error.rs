//! Site Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A site error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for site operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Configuration is invalid; fix it before retrying.
    #[display("invalid configuration")]
    Config,
    /// The offline cache could not be set up, installed or activated.
    #[display("offline cache error")]
    Cache,
    /// The embed resolver could not be built.
    #[display("embed setup error")]
    Embed,
    /// The page address could not be resolved against the site origin.
    #[display("invalid page path: {_0}")]
    InvalidPage(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cache)
    }
}
