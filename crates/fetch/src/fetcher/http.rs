//! HTTP fetcher backed by [`reqwest`].
//!
//! There is no browser here to enforce cross-origin rules, so this fetcher
//! plays the browser's part relative to a configured page origin:
//!
//! - `same-origin` requests to a foreign origin are refused outright,
//! - `cors` requests to a foreign origin need a matching
//!   `Access-Control-Allow-Origin` header on the response,
//! - `no-cors` requests to a foreign origin come back opaque.

use crate::error::{ErrorKind, Result};
use crate::fetcher::Fetcher;
use crate::{Credentials, Method, Request, RequestMode, Response};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::Url;
use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, COOKIE};
use std::time::Duration;
use tracing::instrument;

/// Fetcher issuing real HTTP requests on behalf of a page served from
/// `origin`.
///
/// # Examples
///
/// ```no_run
/// use lectern_fetch::{Fetcher, HttpFetcher, Request, Url};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let origin = Url::parse("https://docs.example/")?;
/// let fetcher = HttpFetcher::new("http", origin.clone())?;
/// let response = fetcher.fetch(&Request::get(origin.join("/index.html")?)).await?;
/// println!("{} bytes", response.body.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    name: String,
    origin: Url,
    client: reqwest::Client,
}
impl HttpFetcher {
    /// Create a fetcher for pages served from `origin`.
    ///
    /// The client keeps no cookie store, so `credentials: omit` only has to
    /// drop explicit `Cookie` headers.
    pub fn new(name: impl Into<String>, origin: Url) -> Result<Self> {
        if origin.cannot_be_a_base() {
            exn::bail!(ErrorKind::InvalidUrl(origin.to_string()));
        }
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .or_raise(|| ErrorKind::Network("failed to build HTTP client".to_string()))?;
        Ok(Self { name: name.into(), origin, client })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Serialized origin as it appears in `Access-Control-Allow-Origin`.
    fn origin_header(&self) -> String {
        self.origin.origin().ascii_serialization()
    }

    fn cors_allowed(&self, response: &reqwest::Response) -> bool {
        response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == "*" || value == self.origin_header())
    }

    fn copy_headers(response: &reqwest::Response) -> Vec<(String, String)> {
        response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(url = %request.url, mode = %request.mode))]
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let cross_origin = !request.is_same_origin(&self.origin);
        if cross_origin && request.mode == RequestMode::SameOrigin {
            exn::bail!(ErrorKind::SameOriginViolation(request.url.to_string()));
        }

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
        };
        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            // Cookies are governed by the credentials policy, never by headers.
            if name.eq_ignore_ascii_case(COOKIE.as_str()) && request.credentials == Credentials::Omit {
                continue;
            }
            builder = builder.header(name, value);
        }
        if let Some(directive) = request.cache.cache_control() {
            builder = builder.header(CACHE_CONTROL, directive);
        }

        let response = builder.send().await.map_err(|e| exn::Exn::from(ErrorKind::Network(e.to_string())))?;
        let status = response.status().as_u16();
        tracing::debug!(status, cross_origin, "Received response");

        if !cross_origin {
            let headers = Self::copy_headers(&response);
            let body = response.bytes().await.or_raise(|| ErrorKind::Body)?;
            return Ok(Response { headers, ..Response::basic(request.url.clone(), status, body) });
        }

        match request.mode {
            RequestMode::NoCors => Ok(Response::opaque(request.url.clone())),
            RequestMode::Cors if self.cors_allowed(&response) => {
                let headers = Self::copy_headers(&response);
                let body = response.bytes().await.or_raise(|| ErrorKind::Body)?;
                Ok(Response { headers, ..Response::cors(request.url.clone(), status, body) })
            },
            RequestMode::Cors => {
                tracing::debug!(origin = %self.origin_header(), "Response carries no matching CORS grant");
                exn::bail!(ErrorKind::CorsDenied(request.url.to_string()))
            },
            // Rejected before sending.
            RequestMode::SameOrigin => exn::bail!(ErrorKind::SameOriginViolation(request.url.to_string())),
        }
    }
}
