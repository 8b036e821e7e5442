//! Scripted in-memory fetcher for testing.

use crate::error::{ErrorKind, Result};
use crate::fetcher::Fetcher;
use crate::{Request, RequestMode, Response};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

/// What the mock answers for a given URL (and optionally a given mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// Complete with this status and body. `no-cors` requests still see an
    /// opaque response: the mock treats every URL as cross-origin.
    Respond { status: u16, body: Bytes },
    /// Complete with an opaque response.
    Opaque,
    /// Fail with [`ErrorKind::CorsDenied`].
    CorsDenied,
    /// Fail with [`ErrorKind::Network`].
    NetworkError,
}

/// One entry of the mock's activity log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    Started { url: String, mode: RequestMode },
    Settled { url: String, mode: RequestMode, ok: bool },
}

/// In-memory fetcher for testing.
///
/// Routes are keyed by absolute URL. A route may carry a per-mode outcome,
/// so a test can make `cors` fail while `no-cors` succeeds for the same
/// document. Unknown URLs answer `404`. Every call is logged as a
/// [`FetchEvent::Started`] / [`FetchEvent::Settled`] pair, which lets tests
/// assert that attempts never overlap.
///
/// # Examples
///
/// ```
/// use lectern_fetch::{Fetcher, MockFetcher, Request, Url};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let url = Url::parse("https://docs.example/index.html")?;
/// let fetcher = MockFetcher::default().with_response(url.as_str(), 200, "<html></html>");
/// assert!(fetcher.fetch(&Request::get(url.clone())).await?.is_ok());
///
/// fetcher.set_offline(true);
/// assert!(fetcher.fetch(&Request::get(url)).await.is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockFetcher {
    routes: RwLock<HashMap<String, Route>>,
    offline: AtomicBool,
    events: Mutex<Vec<FetchEvent>>,
}

#[derive(Default, Clone)]
struct Route {
    default: Option<MockOutcome>,
    by_mode: HashMap<RequestMode, MockOutcome>,
}

impl MockFetcher {
    /// Answer `status`/`body` for `url` in every mode.
    pub fn with_response(self, url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        self.with_outcome(url, None::<RequestMode>, MockOutcome::Respond { status, body: body.into() })
    }

    /// Script the outcome for `url`, either for one mode or (with `None`) for
    /// every mode without a more specific outcome.
    ///
    /// Panics if called while the routing table is in use. Only intended for
    /// test setup before the fetcher is shared.
    pub fn with_outcome(self, url: impl Into<String>, mode: impl Into<Option<RequestMode>>, outcome: MockOutcome) -> Self {
        {
            let Ok(mut routes) = self.routes.try_write() else {
                // The panic here is DELIBERATE. Builders run during test setup.
                panic!("MockFetcher::with_outcome: routes are locked");
            };
            let route = routes.entry(url.into()).or_default();
            match mode.into() {
                Some(mode) => {
                    route.by_mode.insert(mode, outcome);
                },
                None => route.default = Some(outcome),
            }
        }
        self
    }

    /// Replace the outcome for `url` in every mode after construction.
    pub async fn set_response(&self, url: impl Into<String>, status: u16, body: impl Into<Bytes>) {
        let outcome = MockOutcome::Respond { status, body: body.into() };
        self.routes.write().await.insert(url.into(), Route { default: Some(outcome), by_mode: HashMap::new() });
    }

    /// Simulate the network going away (or coming back).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Everything that happened so far, in order.
    pub async fn events(&self) -> Vec<FetchEvent> {
        self.events.lock().await.clone()
    }

    /// The `(url, mode)` of every started request, in order.
    pub async fn requests(&self) -> Vec<(String, RequestMode)> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                FetchEvent::Started { url, mode } => Some((url.clone(), *mode)),
                FetchEvent::Settled { .. } => None,
            })
            .collect()
    }

    async fn outcome_for(&self, request: &Request) -> MockOutcome {
        let routes = self.routes.read().await;
        routes
            .get(request.url.as_str())
            .and_then(|route| route.by_mode.get(&request.mode).or(route.default.as_ref()))
            .cloned()
            .unwrap_or(MockOutcome::Respond { status: 404, body: Bytes::new() })
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, request: &Request) -> Result<Response> {
        let url = request.url.to_string();
        self.events.lock().await.push(FetchEvent::Started { url: url.clone(), mode: request.mode });
        // Give anything that would race us a chance to run.
        tokio::task::yield_now().await;

        let result = if self.offline.load(Ordering::SeqCst) {
            Err(exn::Exn::from(ErrorKind::Network("offline".to_string())))
        } else {
            match self.outcome_for(request).await {
                MockOutcome::Respond { .. } if request.mode == RequestMode::NoCors => {
                    Ok(Response::opaque(request.url.clone()))
                },
                MockOutcome::Respond { status, body } => Ok(Response::basic(request.url.clone(), status, body)),
                MockOutcome::Opaque => Ok(Response::opaque(request.url.clone())),
                MockOutcome::CorsDenied => Err(exn::Exn::from(ErrorKind::CorsDenied(url.clone()))),
                MockOutcome::NetworkError => Err(exn::Exn::from(ErrorKind::Network(url.clone()))),
            }
        };

        self.events.lock().await.push(FetchEvent::Settled { url, mode: request.mode, ok: result.is_ok() });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    const PDF: &str = "https://docs.example/pdfs/04A/Sujet04A.pdf";

    fn request(mode: RequestMode) -> Request {
        Request::get(Url::parse(PDF).unwrap()).with_mode(mode)
    }

    #[tokio::test]
    async fn test_unknown_url_is_not_found() {
        let fetcher = MockFetcher::default();
        let response = fetcher.fetch(&request(RequestMode::Cors)).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_per_mode_outcome_overrides_default() {
        let fetcher = MockFetcher::default()
            .with_response(PDF, 200, "%PDF-1.7")
            .with_outcome(PDF, RequestMode::Cors, MockOutcome::CorsDenied);
        let err = fetcher.fetch(&request(RequestMode::Cors)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CorsDenied(_)));
        let response = fetcher.fetch(&request(RequestMode::SameOrigin)).await.unwrap();
        assert_eq!(response.body, Bytes::from_static(b"%PDF-1.7"));
    }

    #[tokio::test]
    async fn test_no_cors_is_opaque() {
        let fetcher = MockFetcher::default().with_response(PDF, 200, "%PDF-1.7");
        let response = fetcher.fetch(&request(RequestMode::NoCors)).await.unwrap();
        assert!(response.is_opaque());
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_offline_fails_everything() {
        let fetcher = MockFetcher::default().with_response(PDF, 200, "%PDF-1.7");
        fetcher.set_offline(true);
        let err = fetcher.fetch(&request(RequestMode::Cors)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
    }

    #[tokio::test]
    async fn test_events_are_paired() {
        let fetcher = MockFetcher::default();
        fetcher.fetch(&request(RequestMode::Cors)).await.unwrap();
        let events = fetcher.events().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], FetchEvent::Started { mode: RequestMode::Cors, .. }));
        assert!(matches!(&events[1], FetchEvent::Settled { ok: true, .. }));
        assert_eq!(fetcher.requests().await, vec![(PDF.to_string(), RequestMode::Cors)]);
    }
}
