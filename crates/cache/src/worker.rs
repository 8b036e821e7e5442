use crate::entry::CacheEntry;
use crate::error::{ErrorKind, Result};
use crate::key::{CacheKey, validate as validate_generation};
use crate::manifest::Manifest;
use crate::storage::CacheStorage;
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use lectern_fetch::{Credentials, FetcherHandle, Request, RequestMode, Response, Url};
use std::sync::Arc;
use tracing::instrument;

pub type StorageHandle = Arc<dyn CacheStorage + Send + Sync>;

/// Progress events emitted by [`OfflineCache::install_progress`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once, with the manifest size.
/// 2. [`Fetched`](Self::Fetched) once per manifest entry, in completion order.
/// 3. [`Complete`](Self::Complete) exactly once, after every entry has been
///    stored.
///
/// Any error terminates the stream and nothing is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    Started(usize),
    Fetched(Url),
    Complete(usize),
}

/// Network-first cache sitting beneath every fetch of the site.
///
/// Owns one current generation. [`install`](Self::install) fills it from the
/// [`Manifest`], [`handle`](Self::handle) serves requests through it and
/// [`activate`](Self::activate) prunes every other generation.
pub struct OfflineCache {
    generation: String,
    origin: Url,
    manifest: Manifest,
    fetcher: FetcherHandle,
    storage: StorageHandle,
}
impl OfflineCache {
    pub fn new(
        generation: impl Into<String>,
        origin: Url,
        manifest: Manifest,
        fetcher: FetcherHandle,
        storage: StorageHandle,
    ) -> Result<Self> {
        let generation = generation.into();
        validate_generation(&generation)?;
        Ok(Self { generation, origin, manifest, fetcher, storage })
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn storage(&self) -> &StorageHandle {
        &self.storage
    }

    /// Open the current generation and populate it with the whole manifest.
    ///
    /// Every entry is fetched before anything is written. If any entry fails
    /// to fetch or answers with a non-OK status, installation fails and the
    /// generation receives no entries.
    ///
    /// Returns the number of entries stored.
    #[instrument(skip(self), fields(generation = %self.generation, storage = self.storage.name()))]
    pub async fn install(&self) -> Result<usize> {
        let mut events = std::pin::pin!(self.install_progress());
        let mut stored = 0;
        while let Some(event) = events.next().await {
            if let InstallEvent::Complete(count) = event? {
                stored = count;
            }
        }
        tracing::info!(stored, "Offline cache installed");
        Ok(stored)
    }

    /// Streams [`InstallEvent`]s while installing; see [`install`](Self::install).
    ///
    /// Manifest entries are fetched concurrently.
    pub fn install_progress(&self) -> impl Stream<Item = Result<InstallEvent>> + '_ {
        stream!({
            let urls = match self.manifest.resolve(&self.origin) {
                Ok(urls) => urls,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            yield Ok(InstallEvent::Started(urls.len()));

            if let Err(e) = self.storage.open(&self.generation).await.or_raise(|| ErrorKind::Storage) {
                yield Err(e);
                return;
            }

            let mut fetching: FuturesUnordered<_> = urls.into_iter().map(|url| self.fetch_for_install(url)).collect();
            let mut entries = Vec::with_capacity(fetching.len());
            while let Some(result) = fetching.next().await {
                match result {
                    Ok(entry) => {
                        yield Ok(InstallEvent::Fetched(entry.response.url.clone()));
                        entries.push(entry);
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "Install aborted; nothing stored");
                        yield Err(e);
                        return;
                    },
                }
            }

            let count = entries.len();
            if let Err(e) = self.storage.put_all(&self.generation, entries).await.or_raise(|| ErrorKind::Storage) {
                yield Err(e);
                return;
            }
            yield Ok(InstallEvent::Complete(count));
        })
    }

    async fn fetch_for_install(&self, url: Url) -> Result<CacheEntry> {
        let request = Request::get(url.clone());
        let response = self.fetcher.fetch(&request).await.or_raise(|| ErrorKind::InstallFetch(url.to_string()))?;
        if !response.is_ok() {
            exn::bail!(ErrorKind::InstallStatus { url: url.to_string(), status: response.status });
        }
        tracing::debug!(%url, status = response.status, "Fetched manifest entry");
        CacheEntry::new(CacheKey::from(&request), response)
    }

    /// Serve one request: network first, stored response as fallback.
    ///
    /// PDF requests are re-issued in `no-cors` mode without credentials. A
    /// completed network response (whatever its status) is stored under the
    /// current generation and returned as-is; failing to store it is logged
    /// and does not affect the caller. On a network failure the current
    /// generation is searched first, then every other generation.
    #[instrument(skip(self, request), fields(url = %request.url, mode = %request.mode))]
    pub async fn handle(&self, request: Request) -> Result<Response> {
        let request = if request.is_pdf() {
            request.with_mode(RequestMode::NoCors).with_credentials(Credentials::Omit)
        } else {
            request
        };
        let key = CacheKey::from(&request);

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                self.store(key, &response).await;
                Ok(response)
            },
            Err(network) => {
                tracing::debug!(error = %network, "Network failed; falling back to cache");
                if let Some(entry) = self.storage.lookup(&self.generation, &key).await.or_raise(|| ErrorKind::Storage)? {
                    tracing::info!(%key, "Served from current generation");
                    return Ok(entry.response);
                }
                if let Some(entry) = self.storage.lookup_any(&key).await.or_raise(|| ErrorKind::Storage)? {
                    tracing::info!(%key, "Served from an older generation");
                    return Ok(entry.response);
                }
                tracing::warn!(%key, "Offline and not cached");
                Err(network.raise(ErrorKind::Offline(key.to_string())))
            },
        }
    }

    async fn store(&self, key: CacheKey, response: &Response) {
        let result = match CacheEntry::new(key.clone(), response.clone()) {
            Ok(entry) => self.storage.put(&self.generation, entry).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => tracing::debug!(%key, status = response.status, "Stored network response"),
            Err(e) => tracing::warn!(%key, error = %e, "Could not store network response"),
        }
    }

    /// Make the current generation the only one: open it if it is missing,
    /// then delete every other generation.
    ///
    /// Returns the names of the deleted generations.
    #[instrument(skip(self), fields(generation = %self.generation))]
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.storage.open(&self.generation).await.or_raise(|| ErrorKind::Storage)?;
        let mut deleted = Vec::new();
        for name in self.storage.generations().await.or_raise(|| ErrorKind::Storage)? {
            if name == self.generation {
                continue;
            }
            if self.storage.delete(&name).await.or_raise(|| ErrorKind::Storage)? {
                tracing::info!(stale = %name, "Deleted stale cache generation");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use lectern_fetch::{FetchEvent, MockFetcher, MockOutcome};

    const ORIGIN: &str = "https://si.example/";

    fn origin() -> Url {
        Url::parse(ORIGIN).unwrap()
    }

    fn url(path: &str) -> Url {
        origin().join(path).unwrap()
    }

    fn small_manifest() -> Manifest {
        Manifest {
            shell: vec!["/index.html".into(), "/style.css".into()],
            pdfs: vec!["/pdfs/15A/Sujet15A.pdf".into()],
            pages: vec![],
        }
    }

    fn cache(fetcher: Arc<MockFetcher>, storage: Arc<MemoryStorage>) -> OfflineCache {
        OfflineCache::new("si-cache-v1", origin(), small_manifest(), fetcher, storage).unwrap()
    }

    fn serving_manifest() -> MockFetcher {
        MockFetcher::default()
            .with_response(url("/index.html").as_str(), 200, "<html>")
            .with_response(url("/style.css").as_str(), 200, "body{}")
            .with_response(url("/pdfs/15A/Sujet15A.pdf").as_str(), 200, "%PDF-1.7")
    }

    #[tokio::test]
    async fn test_install_stores_every_entry() {
        let storage = Arc::new(MemoryStorage::default());
        let worker = cache(Arc::new(serving_manifest()), storage.clone());
        assert_eq!(worker.install().await.unwrap(), 3);
        assert_eq!(storage.keys("si-cache-v1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_install_progress_order() {
        let worker = cache(Arc::new(serving_manifest()), Arc::new(MemoryStorage::default()));
        let events: Vec<_> = worker.install_progress().map(|e| e.unwrap()).collect().await;
        assert_eq!(events.first(), Some(&InstallEvent::Started(3)));
        assert_eq!(events.last(), Some(&InstallEvent::Complete(3)));
        assert_eq!(events.iter().filter(|e| matches!(e, InstallEvent::Fetched(_))).count(), 3);
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing_on_bad_status() {
        let fetcher = serving_manifest().with_response(url("/style.css").as_str(), 404, "");
        let storage = Arc::new(MemoryStorage::default());
        let worker = cache(Arc::new(fetcher), storage.clone());
        let err = worker.install().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InstallStatus { status: 404, .. }));
        assert!(storage.keys("si-cache-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing_on_network_error() {
        let fetcher = serving_manifest().with_outcome(url("/index.html").as_str(), None::<RequestMode>, MockOutcome::NetworkError);
        let storage = Arc::new(MemoryStorage::default());
        let worker = cache(Arc::new(fetcher), storage.clone());
        let err = worker.install().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InstallFetch(_)));
        assert!(storage.keys("si-cache-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_network_first_then_offline_fallback() {
        let fetcher = Arc::new(MockFetcher::default().with_response(url("/index.html").as_str(), 200, "<html>"));
        let worker = cache(fetcher.clone(), Arc::new(MemoryStorage::default()));

        let live = worker.handle(Request::get(url("/index.html"))).await.unwrap();
        assert_eq!(live.body, "<html>");

        fetcher.set_offline(true);
        let stored = worker.handle(Request::get(url("/index.html"))).await.unwrap();
        assert_eq!(stored, live);
    }

    #[tokio::test]
    async fn test_handle_overwrites_with_latest_response() {
        let fetcher = Arc::new(MockFetcher::default().with_response(url("/index.html").as_str(), 200, "old"));
        let worker = cache(fetcher.clone(), Arc::new(MemoryStorage::default()));
        worker.handle(Request::get(url("/index.html"))).await.unwrap();
        fetcher.set_response(url("/index.html").as_str(), 200, "new").await;
        worker.handle(Request::get(url("/index.html"))).await.unwrap();

        fetcher.set_offline(true);
        let stored = worker.handle(Request::get(url("/index.html"))).await.unwrap();
        assert_eq!(stored.body, "new");
    }

    #[tokio::test]
    async fn test_handle_reissues_pdf_as_no_cors() {
        let pdf = url("/pdfs/15A/Sujet15A.pdf");
        let fetcher = Arc::new(MockFetcher::default().with_response(pdf.as_str(), 200, "%PDF"));
        let worker = cache(fetcher.clone(), Arc::new(MemoryStorage::default()));
        let response = worker.handle(Request::get(pdf.clone()).with_mode(RequestMode::Cors)).await.unwrap();
        assert!(response.is_opaque());
        assert_eq!(fetcher.requests().await, vec![(pdf.to_string(), RequestMode::NoCors)]);
    }

    #[tokio::test]
    async fn test_handle_keeps_mode_for_other_requests() {
        let fetcher = Arc::new(MockFetcher::default().with_response(url("/style.css").as_str(), 200, "body{}"));
        let worker = cache(fetcher.clone(), Arc::new(MemoryStorage::default()));
        worker.handle(Request::get(url("/style.css"))).await.unwrap();
        let events = fetcher.events().await;
        assert!(matches!(&events[0], FetchEvent::Started { mode: RequestMode::Cors, .. }));
    }

    #[tokio::test]
    async fn test_handle_falls_back_to_older_generation() {
        let storage = Arc::new(MemoryStorage::with_generations(["si-cache-v0"]));
        let old = CacheEntry::new(CacheKey::get(&url("/index.html")), Response::basic(url("/index.html"), 200, "v0")).unwrap();
        storage.put("si-cache-v0", old).await.unwrap();
        let fetcher = Arc::new(MockFetcher::default());
        fetcher.set_offline(true);
        let worker = cache(fetcher, storage);
        let response = worker.handle(Request::get(url("/index.html"))).await.unwrap();
        assert_eq!(response.body, "v0");
    }

    #[tokio::test]
    async fn test_handle_offline_miss_is_error() {
        let fetcher = Arc::new(MockFetcher::default());
        fetcher.set_offline(true);
        let worker = cache(fetcher, Arc::new(MemoryStorage::default()));
        let err = worker.handle(Request::get(url("/welcome.html"))).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Offline(_)));
    }

    #[tokio::test]
    async fn test_handle_does_not_store_head() {
        let storage = Arc::new(MemoryStorage::default());
        let fetcher = Arc::new(MockFetcher::default().with_response(url("/index.html").as_str(), 200, "<html>"));
        let worker = cache(fetcher, storage.clone());
        let head = Request::get(url("/index.html")).with_method(lectern_fetch::Method::Head);
        assert!(worker.handle(head).await.is_ok());
        assert!(!storage.has("si-cache-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_leaves_one_generation() {
        let storage = Arc::new(MemoryStorage::with_generations(["si-cache-v0", "si-cache-v1", "scratch"]));
        let worker = cache(Arc::new(MockFetcher::default()), storage.clone());
        let mut deleted = worker.activate().await.unwrap();
        deleted.sort();
        assert_eq!(deleted, vec!["scratch", "si-cache-v0"]);
        assert_eq!(storage.generations().await.unwrap(), vec!["si-cache-v1"]);
    }

    #[tokio::test]
    async fn test_activate_before_install_keeps_current_generation() {
        let storage = Arc::new(MemoryStorage::with_generations(["si-cache-v0"]));
        let worker = cache(Arc::new(MockFetcher::default()), storage.clone());
        assert_eq!(worker.activate().await.unwrap(), vec!["si-cache-v0"]);
        assert_eq!(storage.generations().await.unwrap(), vec!["si-cache-v1"]);
        assert!(storage.keys("si-cache-v1").await.unwrap().is_empty());
    }

    #[test]
    fn test_rejects_invalid_generation() {
        let result = OfflineCache::new(
            "",
            origin(),
            Manifest::default(),
            Arc::new(MockFetcher::default()),
            Arc::new(MemoryStorage::default()),
        );
        assert!(result.is_err());
    }
}
