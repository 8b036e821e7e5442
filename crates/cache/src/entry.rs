//! Stored responses.

use crate::error::{ErrorKind, Result};
use crate::key::CacheKey;
use lectern_fetch::{Method, Response};
use time::OffsetDateTime;

/// A response stored under a [`CacheKey`] in one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub response: Response,
    /// When this entry was (last) written.
    pub stored_at: OffsetDateTime,
}
impl CacheEntry {
    /// Builds an entry stamped with the current time, refusing pairs the
    /// Cache API would refuse.
    pub fn new(key: CacheKey, response: Response) -> Result<Self> {
        check_storable(&key, &response)?;
        Ok(Self { key, response, stored_at: OffsetDateTime::now_utc() })
    }
}

/// Partial responses and non-`GET` requests are never stored.
pub(crate) fn check_storable(key: &CacheKey, response: &Response) -> Result<()> {
    if key.method != Method::Get {
        exn::bail!(ErrorKind::Unstorable(format!("{key}: only GET requests are cached")));
    }
    if response.status == 206 {
        exn::bail!(ErrorKind::Unstorable(format!("{key}: partial content")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_fetch::Url;

    fn url() -> Url {
        Url::parse("https://docs.example/pdfs/30A/Sujet30A.pdf").unwrap()
    }

    #[test]
    fn test_accepts_opaque_and_error_statuses() {
        // Whatever the network handed back is stored; only the shape matters.
        assert!(CacheEntry::new(CacheKey::get(&url()), Response::opaque(url())).is_ok());
        assert!(CacheEntry::new(CacheKey::get(&url()), Response::basic(url(), 404, "")).is_ok());
    }

    #[test]
    fn test_rejects_partial_content() {
        let err = CacheEntry::new(CacheKey::get(&url()), Response::basic(url(), 206, "%PDF")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unstorable(_)));
    }

    #[test]
    fn test_rejects_head() {
        let key = CacheKey::new(Method::Head, &url());
        let err = CacheEntry::new(key, Response::basic(url(), 200, "")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unstorable(_)));
    }
}
