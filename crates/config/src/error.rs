//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A config error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A configuration file could not be read or parsed.
    #[display("could not load configuration")]
    Load,
    /// Only TOML and JSON files are understood.
    #[display("unsupported configuration format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The site origin is not an absolute http(s) URL.
    #[display("invalid site origin: {_0:?}")]
    InvalidOrigin(#[error(not(source))] String),
    /// The cache generation name is not usable.
    #[display("invalid cache generation: {_0:?}")]
    InvalidGeneration(#[error(not(source))] String),
    /// The local cache directory is not an absolute path.
    #[display("cache path must be absolute: {_0}")]
    InvalidCachePath(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Load)
    }
}
