//! Fetch Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! A fetch that *completes* never produces an error, whatever its status code;
//! a 404 is a [`Response`](crate::Response) like any other. Errors are reserved
//! for the cases where the caller never gets a response at all.

use derive_more::{Display, Error};

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote host could not be reached (DNS, connection, TLS, offline).
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// A `cors` request reached a host that did not grant access.
    #[display("cross-origin request denied: {_0}")]
    CorsDenied(#[error(not(source))] String),
    /// A `same-origin` request targeted a foreign origin.
    #[display("same-origin request to foreign origin: {_0}")]
    SameOriginViolation(#[error(not(source))] String),
    /// The request URL could not be parsed or resolved.
    #[display("invalid URL: {_0}")]
    InvalidUrl(#[error(not(source))] String),
    /// The response started but its body could not be read to completion.
    #[display("failed to read response body")]
    Body,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Body)
    }

    /// Returns `true` for failures caused by the browser's cross-origin rules
    /// rather than by the network.
    pub fn is_policy(&self) -> bool {
        matches!(self, Self::CorsDenied(_) | Self::SameOriginViolation(_))
    }
}
