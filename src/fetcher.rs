use async_trait::async_trait;
use exn::ResultExt;
use lectern_cache::OfflineCache;
use lectern_fetch::error::{ErrorKind as FetchErrorKind, Result as FetchResult};
use lectern_fetch::{Fetcher, Request, Response};
use std::sync::Arc;

/// A [`Fetcher`] that sends every request through the offline cache.
///
/// Sits between the embed resolver and the network the way a service worker
/// sits between a page and the network: callers never know whether the
/// answer came live or from storage. A request that is neither reachable nor
/// stored fails as a network error.
pub struct CachedFetcher {
    cache: Arc<OfflineCache>,
}
impl CachedFetcher {
    pub fn new(cache: Arc<OfflineCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Fetcher for CachedFetcher {
    fn name(&self) -> &str {
        "offline-cache"
    }

    async fn fetch(&self, request: &Request) -> FetchResult<Response> {
        let url = request.url.to_string();
        self.cache.handle(request.clone()).await.or_raise(|| FetchErrorKind::Network(url))
    }
}
