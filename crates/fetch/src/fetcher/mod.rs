//! Fetcher trait and implementations.
//!
//! [`Fetcher`] is the seam every network access in the workspace goes
//! through: the resolver's strategies, the offline cache's installer and its
//! network-first handler. Swapping the implementation is how the offline
//! cache slots in as a transparent proxy beneath the resolver.

mod http;
#[cfg(feature = "mock")]
mod mock;

pub use self::http::HttpFetcher;
#[cfg(feature = "mock")]
pub use self::mock::{FetchEvent, MockFetcher, MockOutcome};
use crate::error::Result;
use crate::{Request, Response};
use async_trait::async_trait;

/// Unified interface for issuing fetches.
///
/// Implementations must follow browser `fetch()` semantics: any response that
/// arrives, whatever its status, is `Ok`; `Err` means no response was
/// obtained (network failure or a cross-origin policy refusal).
///
/// # Examples
///
/// ```
/// use lectern_fetch::{Fetcher, Request, Url, error::Result};
///
/// async fn fetch_size(fetcher: &dyn Fetcher, url: Url) -> Result<usize> {
///     let response = fetcher.fetch(&Request::get(url)).await?;
///     Ok(response.body.len())
/// }
/// ```
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Name of the fetcher, used for logging only.
    fn name(&self) -> &str;

    /// Issue a single request.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}
