//! Object URLs: process-local addresses for fetched bodies.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Registry of live object URLs, like the browser's blob URL store.
///
/// # Examples
///
/// ```
/// use lectern_embed::BlobStore;
/// use lectern_fetch::Url;
/// use std::sync::Arc;
///
/// let store = Arc::new(BlobStore::new(&Url::parse("https://si.example/").unwrap()));
/// let lease = store.create("%PDF-1.7".into());
/// assert!(lease.url().starts_with("blob:https://si.example/"));
/// assert!(store.get(lease.url()).is_some());
///
/// assert!(lease.release());
/// assert!(store.get(lease.url()).is_none());
/// ```
#[derive(Debug)]
pub struct BlobStore {
    prefix: String,
    blobs: Mutex<HashMap<String, Bytes>>,
}
impl BlobStore {
    /// Object URLs are scoped to the origin that created them.
    pub fn new(origin: &lectern_fetch::Url) -> Self {
        Self {
            prefix: format!("blob:{}/", origin.origin().ascii_serialization()),
            blobs: Mutex::new(HashMap::new()),
        }
    }

    /// Register `body` under a fresh object URL.
    pub fn create(self: &Arc<Self>, body: Bytes) -> BlobLease {
        let url = format!("{}{}", self.prefix, Uuid::new_v4());
        tracing::trace!(%url, size = body.len(), "Created object URL");
        self.lock().insert(url.clone(), body);
        BlobLease { url, store: Arc::clone(self), released: AtomicBool::new(false) }
    }

    pub fn get(&self, url: &str) -> Option<Bytes> {
        self.lock().get(url).cloned()
    }

    /// Number of live object URLs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn revoke(&self, url: &str) -> bool {
        self.lock().remove(url).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Bytes>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ownership of one object URL.
///
/// The URL is revoked exactly once: by the first [`release`](Self::release),
/// or on drop if it was never released.
#[derive(Debug)]
pub struct BlobLease {
    url: String,
    store: Arc<BlobStore>,
    released: AtomicBool,
}
impl BlobLease {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Revoke the object URL. Returns `false` if it was already released.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.store.revoke(&self.url);
        tracing::debug!(url = %self.url, "Released object URL");
        true
    }
}
impl Drop for BlobLease {
    fn drop(&mut self) {
        self.release();
    }
}
