//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! TODO: Split storage-level kinds from worker-level kinds once a second
//!       storage consumer exists; today the worker is the only caller.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Generation does not exist.
    #[display("cache generation not found: {_0}")]
    GenerationNotFound(#[error(not(source))] String),
    /// Generation name is empty, reserved, or not usable as a storage key.
    #[display("invalid cache generation name: {_0:?}")]
    InvalidGeneration(#[error(not(source))] String),
    /// The Cache API refuses to store this request/response pair (partial
    /// content, or a method other than `GET`).
    #[display("response cannot be cached: {_0}")]
    Unstorable(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Stored entry could not be decoded.
    #[display("corrupt cache entry: {_0}")]
    InvalidData(#[error(not(source))] String),
    /// A manifest entry could not be fetched during install.
    #[display("manifest entry failed to fetch: {_0}")]
    InstallFetch(#[error(not(source))] String),
    /// A manifest entry answered with a non-OK status during install.
    #[display("manifest entry answered {status}: {url}")]
    InstallStatus {
        url: String,
        status: u16,
    },
    /// The network failed and nothing was stored for the request.
    #[display("offline and not cached: {_0}")]
    Offline(#[error(not(source))] String),
    /// A manifest path could not be resolved against the site origin.
    #[display("invalid manifest entry: {_0}")]
    InvalidManifest(#[error(not(source))] String),
    /// The cache storage failed underneath a worker operation.
    #[display("cache storage error")]
    Storage,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::InstallFetch(_) | Self::Offline(_) | Self::Storage)
    }
}
