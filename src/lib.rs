//! PDF embedding with a delivery fallback chain and a network-first offline
//! cache.
//!
//! [`Site`] assembles the workspace crates from a [`Config`]: one network
//! fetcher, one [`OfflineCache`] wrapping it, and embed resolvers whose every
//! fetch goes through that cache.

pub mod error;
mod fetcher;

pub use crate::fetcher::CachedFetcher;
pub use lectern_config::Config;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use lectern_cache::{LocalStorage, MemoryStorage, OfflineCache, StorageHandle};
use lectern_config::StorageConfig;
use lectern_embed::{Capabilities, HeadlessSurface, Page, Resolver, Surface};
use lectern_fetch::{FetcherHandle, HttpFetcher, Url};
use std::sync::Arc;
use tracing::instrument;

/// A configured site: its offline cache and the fetcher pages use.
pub struct Site {
    config: Config,
    origin: Url,
    cache: Arc<OfflineCache>,
    fetcher: FetcherHandle,
}
impl Site {
    /// Build a site that talks to the network over HTTP.
    pub fn from_config(config: Config) -> Result<Self> {
        let origin = config.origin().or_raise(|| ErrorKind::Config)?;
        let network = HttpFetcher::new("http", origin).or_raise(|| ErrorKind::Config)?;
        Self::with_network(config, Arc::new(network))
    }

    /// Build a site on top of any network fetcher.
    pub fn with_network(config: Config, network: FetcherHandle) -> Result<Self> {
        config.validate().or_raise(|| ErrorKind::Config)?;
        let origin = config.origin().or_raise(|| ErrorKind::Config)?;
        let storage: StorageHandle = match &config.cache.storage {
            StorageConfig::Memory => Arc::new(MemoryStorage::default()),
            StorageConfig::Local { path } => Arc::new(LocalStorage::new("local", path).or_raise(|| ErrorKind::Cache)?),
        };
        let cache = OfflineCache::new(
            config.cache.generation.clone(),
            origin.clone(),
            config.cache.manifest.clone(),
            network,
            storage,
        )
        .or_raise(|| ErrorKind::Cache)?;
        let cache = Arc::new(cache);
        let fetcher: FetcherHandle = Arc::new(CachedFetcher::new(cache.clone()));
        tracing::debug!(origin = %origin, generation = cache.generation(), "Site assembled");
        Ok(Self { config, origin, cache, fetcher })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn cache(&self) -> &Arc<OfflineCache> {
        &self.cache
    }

    /// The fetcher pages should use; it goes through the offline cache.
    pub fn fetcher(&self) -> &FetcherHandle {
        &self.fetcher
    }

    /// Install the manifest into the current generation, then drop every
    /// other generation. Returns the number of entries installed.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<usize> {
        let installed = self.cache.install().await.or_raise(|| ErrorKind::Cache)?;
        let stale = self.cache.activate().await.or_raise(|| ErrorKind::Cache)?;
        tracing::info!(installed, stale = stale.len(), "Offline cache ready");
        Ok(installed)
    }

    /// A resolver for the page at `path`, fetching through the offline cache.
    pub fn resolver(&self, path: &str, capabilities: Capabilities) -> Result<Resolver> {
        let base = self.origin.join(path).or_raise(|| ErrorKind::InvalidPage(path.to_string()))?;
        let resolver = Resolver::new(self.fetcher.clone(), base, self.config.embed.strings.clone())
            .or_raise(|| ErrorKind::Embed)?
            .with_verify_delay(self.config.embed.verify_delay())
            .with_capabilities(capabilities);
        Ok(resolver)
    }

    /// Mount every embed target of the page at `path` on a headless surface.
    pub fn page(&self, path: &str, html: &str, capabilities: Capabilities) -> Result<Page> {
        let mut page = Page::new(Arc::new(self.resolver(path, capabilities)?));
        let origin = self.origin.clone();
        page.mount_html(html, |_| Arc::new(HeadlessSurface::new(origin.clone())) as Arc<dyn Surface>);
        Ok(page)
    }
}
