//! Local filesystem cache storage.
//!
//! Each generation is a directory under the configured root. Each entry is a
//! pair of files named by the BLAKE3 digest of its [`CacheKey`]: a JSON
//! metadata file and the raw body. Writes are staged in a scratch directory
//! and renamed into place while holding the storage's write lock; readers
//! hold the read lock, so a lookup never pairs metadata with another write's
//! body.

use crate::entry::{CacheEntry, check_storable};
use crate::error::{ErrorKind, Result};
use crate::key::{CacheKey, validate as validate_generation};
use crate::storage::CacheStorage;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use lectern_fetch::{Method, Response, ResponseKind, Url};
use serde::{Deserialize, Serialize};
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::fs;
use tokio::sync::RwLock;

const META_EXTENSION: &str = "json";
const BODY_EXTENSION: &str = "body";
const STAGING_PREFIX: &str = ".staging-";

/// On-disk shape of an entry's metadata.
#[derive(Debug, Serialize, Deserialize)]
struct StoredMeta {
    method: String,
    url: String,
    response_url: String,
    status: u16,
    kind: String,
    headers: Vec<(String, String)>,
    stored_at: String,
}
impl StoredMeta {
    fn from_entry(entry: &CacheEntry) -> Result<Self> {
        Ok(Self {
            method: entry.key.method.to_string(),
            url: entry.key.url.clone(),
            response_url: entry.response.url.to_string(),
            status: entry.response.status,
            kind: entry.response.kind.to_string(),
            headers: entry.response.headers.clone(),
            stored_at: entry.stored_at.format(&Rfc3339).or_raise(|| ErrorKind::InvalidData("stored_at".to_string()))?,
        })
    }

    fn into_entry(self, body: Vec<u8>) -> Result<CacheEntry> {
        let method = Method::from_name(&self.method).ok_or_raise(|| ErrorKind::InvalidData(self.method.clone()))?;
        let kind = ResponseKind::from_name(&self.kind).ok_or_raise(|| ErrorKind::InvalidData(self.kind.clone()))?;
        let response_url = Url::parse(&self.response_url).or_raise(|| ErrorKind::InvalidData(self.response_url.clone()))?;
        let stored_at =
            OffsetDateTime::parse(&self.stored_at, &Rfc3339).or_raise(|| ErrorKind::InvalidData(self.stored_at.clone()))?;
        Ok(CacheEntry {
            key: CacheKey { method, url: self.url },
            response: Response {
                url: response_url,
                status: self.status,
                kind,
                headers: self.headers,
                body: body.into(),
            },
            stored_at,
        })
    }
}

/// Local filesystem cache storage.
///
/// Survives process restarts, which is what the browser's own cache storage
/// does for a service worker. Generations are listed in lexicographic order.
///
/// # Examples
///
/// ```no_run
/// use lectern_cache::LocalStorage;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = LocalStorage::new("disk", "/var/cache/lectern")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalStorage {
    name: String,
    root: PathBuf,
    // Guards file moves and deletions against concurrent readers. Shared by clones.
    lock: Arc<RwLock<()>>,
}
impl LocalStorage {
    /// Create a new local cache storage rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists and is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidData(format!("cache root must be an absolute directory: {}", root.display())));
        }
        if !root.exists() {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(ErrorKind::Io)?;
        }
        Ok(Self { name: name.into(), root, lock: Arc::new(RwLock::new(())) })
    }

    fn generation_dir(&self, generation: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_generation(generation)?))
    }

    fn file_names(key: &CacheKey) -> (String, String) {
        let digest = key.digest();
        (format!("{digest}.{META_EXTENSION}"), format!("{digest}.{BODY_EXTENSION}"))
    }

    /// Write an entry's two files into `dir`, body first.
    async fn write_entry(dir: &Path, entry: &CacheEntry) -> Result<()> {
        let (meta_name, body_name) = Self::file_names(&entry.key);
        let meta = serde_json::to_vec(&StoredMeta::from_entry(entry)?)
            .or_raise(|| ErrorKind::InvalidData(entry.key.to_string()))?;
        fs::write(dir.join(body_name), &entry.response.body).await.map_err(ErrorKind::Io)?;
        fs::write(dir.join(meta_name), meta).await.map_err(ErrorKind::Io)?;
        Ok(())
    }

    async fn read_meta(path: &Path) -> Result<Option<StoredMeta>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => exn::bail!(ErrorKind::Io(err)),
        };
        let meta = serde_json::from_slice(&bytes).or_raise(|| ErrorKind::InvalidData(path.display().to_string()))?;
        Ok(Some(meta))
    }
}

#[async_trait]
impl CacheStorage for LocalStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generations(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await.map_err(ErrorKind::Io)?;
        while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::Io)? {
            let is_dir = entry.file_type().await.map_err(ErrorKind::Io)?.is_dir();
            // Skip staging directories and anything that isn't valid UTF-8.
            if let Some(name) = entry.file_name().to_str()
                && is_dir
                && validate_generation(name).is_ok()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn open(&self, generation: &str) -> Result<()> {
        let dir = self.generation_dir(generation)?;
        fs::create_dir_all(&dir).await.map_err(ErrorKind::Io)?;
        Ok(())
    }

    async fn delete(&self, generation: &str) -> Result<bool> {
        let dir = self.generation_dir(generation)?;
        let _guard = self.lock.write().await;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => exn::bail!(ErrorKind::Io(err)),
        }
    }

    async fn put(&self, generation: &str, entry: CacheEntry) -> Result<()> {
        self.put_all(generation, vec![entry]).await
    }

    async fn put_all(&self, generation: &str, entries: Vec<CacheEntry>) -> Result<()> {
        for entry in &entries {
            check_storable(&entry.key, &entry.response)?;
        }
        let dir = self.generation_dir(generation)?;
        // Stage every entry first; a failure here leaves the generation
        // untouched and the staging directory is removed on drop.
        let staging = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(&self.root).map_err(ErrorKind::Io)?;
        for entry in &entries {
            Self::write_entry(staging.path(), entry).await?;
        }
        let _guard = self.lock.write().await;
        fs::create_dir_all(&dir).await.map_err(ErrorKind::Io)?;
        // Bodies before metadata, so no entry becomes visible half-written.
        for extension in [BODY_EXTENSION, META_EXTENSION] {
            for entry in &entries {
                let (meta_name, body_name) = Self::file_names(&entry.key);
                let name = if extension == BODY_EXTENSION { body_name } else { meta_name };
                fs::rename(staging.path().join(&name), dir.join(&name)).await.map_err(ErrorKind::Io)?;
            }
        }
        tracing::debug!(generation, entries = entries.len(), "Staged entries moved into generation");
        Ok(())
    }

    async fn lookup(&self, generation: &str, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let dir = self.generation_dir(generation)?;
        let (meta_name, body_name) = Self::file_names(key);
        let _guard = self.lock.read().await;
        let Some(meta) = Self::read_meta(&dir.join(meta_name)).await? else {
            return Ok(None);
        };
        let body = fs::read(dir.join(body_name)).await.map_err(ErrorKind::Io)?;
        let entry = meta.into_entry(body)?;
        // A digest collision is astronomically unlikely, but a mismatch means
        // the file does not belong to this key.
        if entry.key != *key {
            tracing::warn!(expected = %key, found = %entry.key, "Cache entry key mismatch; treating as miss");
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn keys(&self, generation: &str) -> Result<Vec<CacheKey>> {
        let dir = self.generation_dir(generation)?;
        let _guard = self.lock.read().await;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                exn::bail!(ErrorKind::GenerationNotFound(generation.to_string()))
            },
            Err(err) => exn::bail!(ErrorKind::Io(err)),
        };
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::Io)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(META_EXTENSION) {
                continue;
            }
            if let Some(meta) = Self::read_meta(&path).await? {
                let method = Method::from_name(&meta.method).ok_or_raise(|| ErrorKind::InvalidData(meta.method.clone()))?;
                keys.push(CacheKey { method, url: meta.url });
            }
        }
        keys.sort();
        Ok(keys)
    }
}
