//! Cache storage trait and implementations.
//!
//! This module defines the [`CacheStorage`] trait, the primitive underneath
//! the offline cache: a set of named generations, each a map from
//! [`CacheKey`] to [`CacheEntry`]. It plays the part of the browser's
//! `CacheStorage`/`Cache` pair.

mod local;
mod memory;

pub use self::local::LocalStorage;
pub use self::memory::MemoryStorage;
use crate::entry::CacheEntry;
use crate::error::Result;
use crate::key::CacheKey;
use async_trait::async_trait;

/// Unified interface for cache storage backends.
///
/// Implementations serialize concurrent access internally, so every method
/// takes `&self` and callers need no locking of their own.
///
/// # Examples
///
/// ```
/// use lectern_cache::{CacheEntry, CacheKey, CacheStorage, MemoryStorage};
/// use lectern_fetch::{Response, Url};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = MemoryStorage::default();
/// let url = Url::parse("https://docs.example/index.html")?;
/// let entry = CacheEntry::new(CacheKey::get(&url), Response::basic(url.clone(), 200, "<html>"))?;
/// storage.put("si-cache-v1", entry).await?;
///
/// let found = storage.lookup("si-cache-v1", &CacheKey::get(&url)).await?;
/// assert_eq!(found.map(|e| e.response.status), Some(200));
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Name of the configured storage, used for logging only.
    fn name(&self) -> &str;

    /// Names of all existing generations.
    async fn generations(&self) -> Result<Vec<String>>;

    /// Check if a generation exists.
    async fn has(&self, generation: &str) -> Result<bool> {
        Ok(self.generations().await?.iter().any(|g| g == generation))
    }

    /// Create the generation if it does not exist yet.
    async fn open(&self, generation: &str) -> Result<()>;

    /// Delete a generation and every entry in it.
    ///
    /// Returns `false` if the generation did not exist.
    async fn delete(&self, generation: &str) -> Result<bool>;

    /// Store one entry, creating the generation if needed and replacing any
    /// previous entry with the same key.
    async fn put(&self, generation: &str, entry: CacheEntry) -> Result<()>;

    /// Store several entries all-or-nothing: either every entry becomes
    /// visible, or (on error) none of them does.
    async fn put_all(&self, generation: &str, entries: Vec<CacheEntry>) -> Result<()>;

    /// Find the entry for `key` in one generation. A missing generation is
    /// simply a miss.
    async fn lookup(&self, generation: &str, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Find the entry for `key` in any generation, in the order returned by
    /// [`generations()`](Self::generations).
    async fn lookup_any(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        for generation in self.generations().await? {
            if let Some(entry) = self.lookup(&generation, key).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Keys stored in one generation.
    ///
    /// Returns [`GenerationNotFound`](crate::error::ErrorKind::GenerationNotFound)
    /// if the generation does not exist.
    async fn keys(&self, generation: &str) -> Result<Vec<CacheKey>>;
}
