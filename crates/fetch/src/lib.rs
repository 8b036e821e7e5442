//! Browser-style fetch for the PDF delivery chain and the offline cache.
//!
//! The crate models just enough of `fetch()` for the rest of the workspace to
//! reason about cross-origin behaviour: [`Request`] carries a [`RequestMode`],
//! a [`Credentials`] policy and a [`CacheDirective`]; [`Response`] reports
//! whether it is readable or [opaque](ResponseKind::Opaque).

pub mod error;
mod fetcher;
mod request;
mod response;

#[cfg(feature = "mock")]
pub use crate::fetcher::{FetchEvent, MockFetcher, MockOutcome};
pub use crate::fetcher::{Fetcher, HttpFetcher};
pub use crate::request::{CacheDirective, Credentials, Method, Request, RequestMode};
pub use crate::response::{Response, ResponseKind};
pub use reqwest::Url;
use std::sync::Arc;

pub type FetcherHandle = Arc<dyn Fetcher + Send + Sync>;
