//! Request identity and generation naming.

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use lectern_fetch::{Method, Request, Url};

/// Identity of a stored response within a generation.
///
/// Two requests share an entry when they use the same method and the same
/// URL once the fragment is dropped (fragments never reach the server).
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("{method} {url}")]
pub struct CacheKey {
    pub method: Method,
    pub url: String,
}
impl CacheKey {
    pub fn new(method: Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self { method, url: url.into() }
    }

    pub fn get(url: &Url) -> Self {
        Self::new(Method::Get, url)
    }

    /// Stable file-system-safe digest of this key.
    pub(crate) fn digest(&self) -> String {
        blake3::hash(self.to_string().as_bytes()).to_hex().to_string()
    }
}
impl From<&Request> for CacheKey {
    fn from(request: &Request) -> Self {
        Self::new(request.method, &request.url)
    }
}

/// Validates a cache generation name.
///
/// Generation names double as directory names for on-disk storage, so they
/// must be a single non-empty path segment. Names starting with `.` are
/// reserved for staging.
///
/// # Examples
///
/// ```
/// use lectern_cache::validate_generation;
/// assert!(validate_generation("si-cache-v1").is_ok());
/// assert!(validate_generation("").is_err());
/// assert!(validate_generation("../v1").is_err());
/// assert!(validate_generation(".staging").is_err());
/// ```
pub fn validate(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed != name
        || name.starts_with('.')
        || name.chars().any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control());
    if invalid {
        exn::bail!(ErrorKind::InvalidGeneration(name.to_string()));
    }
    Ok(name)
}
