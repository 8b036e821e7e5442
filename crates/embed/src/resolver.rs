//! The delivery fallback chain.
//!
//! A [`Resolver`] walks one [`EmbedController`] through its state machine:
//!
//! ```text
//! Unresolved → Attempting(strategy) → Verified(strategy)
//!                                   ↘ Terminal(native-object-element)
//! Unresolved → Terminal(plain-link-fallback)     (no inline viewer)
//! ```
//!
//! Network strategies are tried one after the other until one yields a body,
//! which is handed to the frame as an object URL. When none does, the frame
//! is pointed at the remote URL directly. Either way a verification pass runs
//! after a fixed delay and swaps in the object element if nothing rendered.
//! `Verified` and `Terminal` never change again.

use crate::blob::{BlobLease, BlobStore};
use crate::capabilities::Capabilities;
use crate::consts::PDF_MIME;
use crate::error::{ErrorKind, Result};
use crate::markup::{Markup, Strings};
use crate::strategy::DeliveryStrategy;
use crate::surface::{Fallback, Probe, Source, Surface};
use crate::target::EmbedTarget;
use derive_more::Display;
use exn::ResultExt;
use lectern_fetch::{CacheDirective, Credentials, FetcherHandle, Request, Response, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::instrument;

/// Delay between assigning a source and checking that it rendered.
pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum State {
    #[display("unresolved")]
    Unresolved,
    #[display("attempting {_0}")]
    Attempting(DeliveryStrategy),
    #[display("verified {_0}")]
    Verified(DeliveryStrategy),
    #[display("terminal {_0}")]
    Terminal(DeliveryStrategy),
}
impl State {
    /// `Verified` and `Terminal` are final.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Verified(_) | Self::Terminal(_))
    }
}

/// How a single strategy attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A readable OK response; its body backs the object URL.
    Loaded,
    /// An opaque response. Accepted without knowing whether it succeeded, so
    /// only the verification pass can tell.
    Opaque,
    /// A readable response with a non-OK status.
    Status(u16),
    /// No response at all (network error, cross-origin denial).
    Failed(String),
    /// The remote URL was assigned directly.
    Assigned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub strategy: DeliveryStrategy,
    pub outcome: AttemptOutcome,
}

#[derive(Debug)]
struct Inner {
    state: State,
    attempts: Vec<Attempt>,
    lease: Option<BlobLease>,
    // Set once the element has left the page; no object URL is created after.
    released: bool,
}

/// Sole owner of one target's state machine, its surface and its object URL.
pub struct EmbedController {
    target: EmbedTarget,
    url: Url,
    surface: Arc<dyn Surface>,
    inner: Mutex<Inner>,
}
impl EmbedController {
    pub fn target(&self) -> &EmbedTarget {
        &self.target
    }

    /// The target's source resolved against the page.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    pub async fn state(&self) -> State {
        self.inner.lock().await.state
    }

    /// Attempts made so far, in order.
    pub async fn attempts(&self) -> Vec<Attempt> {
        self.inner.lock().await.attempts.clone()
    }

    /// The object URL currently owned, if any.
    pub async fn blob_url(&self) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.lease.as_ref().filter(|lease| !lease.is_released()).map(|lease| lease.url().to_string())
    }

    /// Revoke the owned object URL and mark the element as gone, so a chain
    /// that has not started yet never creates one. Returns `false` when there
    /// was nothing left to revoke.
    pub async fn release(&self) -> bool {
        let mut inner = self.inner.lock().await;
        inner.released = true;
        inner.lease.as_ref().is_some_and(BlobLease::release)
    }
}

/// Runs the fallback chain for any number of controllers.
pub struct Resolver {
    fetcher: FetcherHandle,
    blobs: Arc<BlobStore>,
    base: Url,
    verify_delay: Duration,
    capabilities: Capabilities,
    markup: Markup,
}
impl Resolver {
    /// `base` is the page address relative sources are resolved against.
    pub fn new(fetcher: FetcherHandle, base: Url, strings: Strings) -> Result<Self> {
        Ok(Self {
            fetcher,
            blobs: Arc::new(BlobStore::new(&base)),
            base,
            verify_delay: DEFAULT_VERIFY_DELAY,
            capabilities: Capabilities::default(),
            markup: Markup::new(strings)?,
        })
    }

    pub fn with_verify_delay(mut self, delay: Duration) -> Self {
        self.verify_delay = delay;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn blobs(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    pub fn markup(&self) -> &Markup {
        &self.markup
    }

    /// Build the controller for `target`, rendering into `surface`.
    pub fn controller(&self, target: EmbedTarget, surface: Arc<dyn Surface>) -> Result<EmbedController> {
        let url = self.base.join(&target.src).or_raise(|| ErrorKind::InvalidSource(target.src.clone()))?;
        Ok(EmbedController {
            target,
            url,
            surface,
            inner: Mutex::new(Inner { state: State::Unresolved, attempts: Vec::new(), lease: None, released: false }),
        })
    }

    /// Run the chain to completion and return the state it settled in.
    ///
    /// Only an `Unresolved` controller whose element is still on the page is
    /// acted upon; otherwise this is a no-op returning the current state. The
    /// verification pass runs after the configured delay, unconditionally.
    #[instrument(skip_all, fields(id = %controller.target.id, url = %controller.url))]
    pub async fn resolve(&self, controller: &EmbedController) -> State {
        {
            let mut inner = controller.inner.lock().await;
            if inner.state != State::Unresolved {
                return inner.state;
            }
            if inner.released || !controller.surface.is_attached() {
                tracing::debug!("Element left the page before resolution");
                return inner.state;
            }
            if self.capabilities.needs_link_preview() {
                tracing::info!(capabilities = ?self.capabilities, "No inline viewer; showing link preview");
                self.mount(controller, &mut inner, DeliveryStrategy::PlainLinkFallback);
                return inner.state;
            }
            controller.surface.set_notice(Some(&self.markup.strings().loading));
            self.assign(controller, &mut inner).await;
        }
        tokio::time::sleep(self.verify_delay).await;
        self.verify(controller).await
    }

    /// Try each network strategy in turn, then the direct source.
    async fn assign(&self, controller: &EmbedController, inner: &mut Inner) {
        for strategy in DeliveryStrategy::NETWORK {
            inner.state = State::Attempting(strategy);
            match self.fetch(controller, strategy).await {
                Ok(response) => {
                    let outcome = if response.is_opaque() {
                        tracing::warn!(%strategy, "Accepting opaque response; verification will decide");
                        AttemptOutcome::Opaque
                    } else {
                        tracing::debug!(%strategy, status = response.status, "Strategy loaded document");
                        AttemptOutcome::Loaded
                    };
                    inner.attempts.push(Attempt { strategy, outcome });
                    if !controller.surface.is_attached() {
                        tracing::debug!(%strategy, "Element detached during fetch; no object URL created");
                        return;
                    }
                    let size = response.body.len();
                    let lease = self.blobs.create(response.body);
                    controller.surface.assign(&Source::Blob { url: lease.url().to_string(), size });
                    inner.lease = Some(lease);
                    return;
                },
                Err(err) => {
                    tracing::debug!(%strategy, error = %err, "Strategy failed");
                    let outcome = match &*err {
                        ErrorKind::Status(status) => AttemptOutcome::Status(*status),
                        _ => AttemptOutcome::Failed(err.to_string()),
                    };
                    inner.attempts.push(Attempt { strategy, outcome });
                },
            }
        }
        tracing::warn!("Every network strategy failed; assigning the remote URL");
        inner.state = State::Attempting(DeliveryStrategy::DirectSrcIframe);
        controller.surface.assign(&Source::Remote(controller.url.clone()));
        inner.attempts.push(Attempt { strategy: DeliveryStrategy::DirectSrcIframe, outcome: AttemptOutcome::Assigned });
    }

    async fn fetch(&self, controller: &EmbedController, strategy: DeliveryStrategy) -> Result<Response> {
        let Some(mode) = strategy.request_mode() else {
            exn::bail!(ErrorKind::Fetch);
        };
        let request = Request::get(controller.url.clone())
            .with_mode(mode)
            .with_cache(CacheDirective::ForceCache)
            .with_credentials(Credentials::Omit)
            .with_header("Accept", PDF_MIME);
        let response = self.fetcher.fetch(&request).await.or_raise(|| ErrorKind::Fetch)?;
        // Opaque responses report status 0 and are let through unchecked.
        if !response.is_opaque() && !response.is_ok() {
            exn::bail!(ErrorKind::Status(response.status));
        }
        Ok(response)
    }

    /// Check that the assigned source rendered; swap in the object element if
    /// it did not.
    ///
    /// Acts only on an `Attempting` controller whose element is still on the
    /// page; otherwise a no-op returning the current state.
    #[instrument(skip_all, fields(id = %controller.target.id))]
    pub async fn verify(&self, controller: &EmbedController) -> State {
        let mut inner = controller.inner.lock().await;
        let State::Attempting(strategy) = inner.state else {
            return inner.state;
        };
        if !controller.surface.is_attached() {
            tracing::debug!("Element detached before verification");
            return inner.state;
        }
        match controller.surface.probe() {
            Probe::Rendered => {
                tracing::info!(%strategy, "Document rendered");
                controller.surface.set_notice(None);
                inner.state = State::Verified(strategy);
            },
            probe => {
                tracing::info!(%strategy, ?probe, "Nothing rendered; falling back to object element");
                self.mount(controller, &mut inner, DeliveryStrategy::NativeObjectElement);
            },
        }
        inner.state
    }

    /// Force the object-element fallback. A no-op once settled.
    #[instrument(skip_all, fields(id = %controller.target.id))]
    pub async fn finalize(&self, controller: &EmbedController) -> State {
        let mut inner = controller.inner.lock().await;
        if !inner.state.is_settled() {
            self.mount(controller, &mut inner, DeliveryStrategy::NativeObjectElement);
        }
        inner.state
    }

    fn mount(&self, controller: &EmbedController, inner: &mut Inner, strategy: DeliveryStrategy) {
        let src = controller.url.as_str();
        let (rendered, notice) = match strategy {
            DeliveryStrategy::PlainLinkFallback => (self.markup.link_preview(src), None),
            _ => (self.markup.object_fallback(src), Some(self.markup.strings().load_error.as_str())),
        };
        let html = rendered.unwrap_or_else(|err| {
            tracing::error!(error = %err, "Fallback markup failed to render; using a bare link");
            // Serialized URLs percent-encode quotes and angle brackets.
            format!(r#"<a href="{src}">{src}</a>"#)
        });
        controller.surface.set_notice(notice);
        controller.surface.mount_fallback(&Fallback { strategy, html });
        inner.state = State::Terminal(strategy);
    }
}
